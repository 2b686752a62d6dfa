//! Builder for [`Console`].

use super::Console;
use crate::{AppError, SharedPrinterSlot};
use opsgate_runtime::{AccessContext, OpsConfig};

/// Builder for [`Console`].
///
/// Without [`with_context`](Self::with_context) the access context is built
/// from the configuration, which fails on missing identity settings.
#[derive(Debug)]
pub struct ConsoleBuilder {
    config: OpsConfig,
    context: Option<AccessContext>,
    printer_slot: Option<SharedPrinterSlot>,
}

impl ConsoleBuilder {
    pub(super) fn new(config: OpsConfig) -> Self {
        Self {
            config,
            context: None,
            printer_slot: None,
        }
    }

    /// Uses an already wired access context.
    #[must_use]
    pub fn with_context(mut self, context: AccessContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Shares the printer slot with the terminal log writer.
    #[must_use]
    pub fn with_printer_slot(mut self, slot: SharedPrinterSlot) -> Self {
        self.printer_slot = Some(slot);
        self
    }

    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the access context cannot be built
    /// from the configuration.
    pub fn build(self) -> Result<Console, AppError> {
        let context = match self.context {
            Some(ctx) => ctx,
            None => AccessContext::from_config(&self.config)?,
        };
        tracing::debug!(
            debug = self.config.debug,
            verbose = self.config.verbose,
            "console built"
        );
        Ok(Console {
            config: self.config,
            context,
            printer_slot: self.printer_slot.unwrap_or_default(),
        })
    }
}
