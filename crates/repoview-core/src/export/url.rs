//! # Content URL Decorator
//!
//! Sits between the crawler and a document sink during a package export.
//! Content payloads are stored in the package and the sink receives the
//! package-relative descriptor instead of the repository one.

use super::events::{ValueSlot, ViewEvent, ViewSink};
use crate::package::ExportPackageHandler;
use crate::types::{ContentData, Result};
use std::io::Read;

pub struct ContentUrlDecorator<'a> {
    inner: &'a mut dyn ViewSink,
    package: &'a mut dyn ExportPackageHandler,
}

impl<'a> ContentUrlDecorator<'a> {
    #[must_use]
    pub fn new(inner: &'a mut dyn ViewSink, package: &'a mut dyn ExportPackageHandler) -> Self {
        Self { inner, package }
    }
}

impl ViewSink for ContentUrlDecorator<'_> {
    fn event(&mut self, event: &ViewEvent) -> Result<()> {
        self.inner.event(event)
    }

    fn content(
        &mut self,
        slot: &ValueSlot,
        stream: Option<&mut dyn Read>,
        data: &ContentData,
    ) -> Result<()> {
        match stream {
            Some(stream) => {
                let stored = self.package.export_content(stream, data)?;
                self.inner.content(slot, None, &stored)
            }
            None => self.inner.content(slot, None, data),
        }
    }

    fn warning(&mut self, message: &str) {
        self.inner.warning(message);
    }
}
