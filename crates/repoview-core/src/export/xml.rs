//! # View XML Writer
//!
//! Serializes export events into the view document. Output is compact (no
//! indentation) and every registered namespace is declared once on the
//! document element, so equal event streams give byte-identical documents.

use super::events::{ExportMetadata, ReferenceTarget, ValueSlot, ViewEvent, ViewSink};
use crate::iso9075;
use crate::namespace::NamespaceRegistry;
use crate::primitives::{
    ACCESS_STATUS_ATTRIBUTE, ACE_ELEMENT, ACL_ELEMENT, ASPECTS_ELEMENT, ASSOCIATIONS_ELEMENT,
    AUTHORITY_ELEMENT, CHILD_NAME_ATTRIBUTE, DATATYPE_ATTRIBUTE, EXPORTED_BY_ELEMENT,
    EXPORTED_DATE_ELEMENT, EXPORTER_VERSION_ELEMENT, EXPORT_OF_ELEMENT,
    INHERIT_PERMISSIONS_ATTRIBUTE, ISNULL_ATTRIBUTE, LOCALE_ATTRIBUTE, METADATA_ELEMENT,
    MLVALUE_ELEMENT, NODEREF_ATTRIBUTE, PATHREF_ATTRIBUTE, PERMISSION_ELEMENT,
    PROPERTIES_ELEMENT, REFERENCE_ELEMENT, VALUES_ELEMENT, VALUE_ELEMENT, VIEW_ELEMENT,
    VIEW_NAMESPACE_URI, VIEW_PREFIX,
};
use crate::types::{QName, Result, Scalar, ViewError};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Write;

/// A [`ViewSink`] writing the view document to `W`.
pub struct ViewXmlWriter<W: Write> {
    writer: Writer<W>,
    namespaces: NamespaceRegistry,
    open: Vec<String>,
}

impl<W: Write> ViewXmlWriter<W> {
    #[must_use]
    pub fn new(inner: W, namespaces: NamespaceRegistry) -> Self {
        Self {
            writer: Writer::new(inner),
            namespaces,
            open: Vec::new(),
        }
    }

    /// Flush buffered output.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.get_mut().flush()?;
        Ok(())
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn view(&self, local: &str) -> String {
        let prefix = self
            .namespaces
            .prefix(VIEW_NAMESPACE_URI)
            .unwrap_or(VIEW_PREFIX);
        format!("{}:{}", prefix, local)
    }

    /// Element name of a qualified name, with the local part escaped.
    fn element_name(&self, name: &QName) -> Result<String> {
        let prefixed = self
            .namespaces
            .to_prefixed(&QName::new(name.namespace_uri(), iso9075::encode(name.local_name())))?;
        Ok(prefixed)
    }

    fn open(&mut self, name: String, attributes: &[(String, String)]) -> Result<()> {
        let mut start = BytesStart::new(name.as_str());
        for (key, value) in attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        self.writer
            .write_event(Event::Start(start))
            .map_err(ViewError::xml)?;
        self.open.push(name);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let name = self.open.pop().ok_or_else(|| {
            ViewError::InvalidStructure("end event without a matching start".to_string())
        })?;
        self.writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))
            .map_err(ViewError::xml)?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(ViewError::xml)?;
        Ok(())
    }

    fn empty(&mut self, name: &str) -> Result<()> {
        self.writer
            .write_event(Event::Empty(BytesStart::new(name)))
            .map_err(ViewError::xml)?;
        Ok(())
    }

    fn text_element(&mut self, local: &str, text: &str) -> Result<()> {
        self.open(self.view(local), &[])?;
        self.text(text)?;
        self.close()
    }

    fn start_document(&mut self, metadata: &ExportMetadata) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(ViewError::xml)?;
        let declarations: Vec<(String, String)> = self
            .namespaces
            .iter()
            .map(|(prefix, uri)| (format!("xmlns:{}", prefix), uri.to_string()))
            .collect();
        self.open(self.view(VIEW_ELEMENT), &declarations)?;

        self.open(self.view(METADATA_ELEMENT), &[])?;
        self.text_element(EXPORTED_BY_ELEMENT, &metadata.exported_by)?;
        if let Some(date) = &metadata.export_date {
            self.text_element(EXPORTED_DATE_ELEMENT, date)?;
        }
        self.text_element(EXPORTER_VERSION_ELEMENT, &metadata.exporter_version)?;
        for path in &metadata.export_of {
            self.text_element(EXPORT_OF_ELEMENT, path)?;
        }
        self.close()
    }

    fn child_name_attribute(&self, child_name: Option<&QName>) -> Result<Vec<(String, String)>> {
        match child_name {
            Some(name) => Ok(vec![(
                self.view(CHILD_NAME_ATTRIBUTE),
                self.namespaces.to_prefixed(name)?,
            )]),
            None => Ok(Vec::new()),
        }
    }

    fn value(&mut self, slot: &ValueSlot, value: Option<&Scalar>) -> Result<()> {
        let text = value.map(ToString::to_string);
        if value.is_some() && slot.data_type.is_none() && slot.index.is_none() {
            return self.text(text.as_deref().unwrap_or_default());
        }
        let mut attributes = Vec::new();
        if let Some(data_type) = slot.data_type {
            attributes.push((
                self.view(DATATYPE_ATTRIBUTE),
                self.namespaces.to_prefixed(&data_type.qname())?,
            ));
        }
        if value.is_none() {
            attributes.push((self.view(ISNULL_ATTRIBUTE), "true".to_string()));
        }
        self.open(self.view(VALUE_ELEMENT), &attributes)?;
        if let Some(text) = &text {
            self.text(text)?;
        }
        self.close()
    }
}

impl<W: Write> ViewSink for ViewXmlWriter<W> {
    fn event(&mut self, event: &ViewEvent) -> Result<()> {
        match event {
            ViewEvent::Start(metadata) => self.start_document(metadata),
            ViewEvent::StartNamespace { .. } | ViewEvent::EndNamespace { .. } => Ok(()),
            ViewEvent::StartNode {
                node_type,
                child_name,
                ..
            } => {
                let name = self.element_name(node_type)?;
                let attributes = self.child_name_attribute(child_name.as_ref())?;
                self.open(name, &attributes)
            }
            ViewEvent::StartReference {
                target, child_name, ..
            } => {
                let mut attributes = match target {
                    ReferenceTarget::NodeRef(node) => {
                        vec![(self.view(NODEREF_ATTRIBUTE), node.to_string())]
                    }
                    ReferenceTarget::Path(path) => {
                        vec![(self.view(PATHREF_ATTRIBUTE), path.clone())]
                    }
                };
                attributes.extend(self.child_name_attribute(child_name.as_ref())?);
                self.open(self.view(REFERENCE_ELEMENT), &attributes)
            }
            ViewEvent::StartAspects { .. } => self.open(self.view(ASPECTS_ELEMENT), &[]),
            ViewEvent::Aspect { aspect, .. } => {
                let name = self.element_name(aspect)?;
                self.empty(&name)
            }
            ViewEvent::StartAcl { inherit, .. } => {
                let attributes = if *inherit {
                    Vec::new()
                } else {
                    vec![(self.view(INHERIT_PERMISSIONS_ATTRIBUTE), "false".to_string())]
                };
                self.open(self.view(ACL_ELEMENT), &attributes)
            }
            ViewEvent::Permission { permission, .. } => {
                let attributes = vec![(
                    self.view(ACCESS_STATUS_ATTRIBUTE),
                    permission.status.to_string(),
                )];
                self.open(self.view(ACE_ELEMENT), &attributes)?;
                self.text_element(AUTHORITY_ELEMENT, &permission.authority)?;
                self.text_element(PERMISSION_ELEMENT, &permission.permission)?;
                self.close()
            }
            ViewEvent::StartProperties { .. } => self.open(self.view(PROPERTIES_ELEMENT), &[]),
            ViewEvent::StartProperty { property, .. } => {
                let name = self.element_name(property)?;
                self.open(name, &[])
            }
            ViewEvent::StartValues { .. } => self.open(self.view(VALUES_ELEMENT), &[]),
            ViewEvent::Value { slot, value } => self.value(slot, value.as_ref()),
            ViewEvent::MlValue { locale, value, .. } => {
                let mut attributes = vec![(self.view(LOCALE_ATTRIBUTE), locale.clone())];
                if value.is_none() {
                    attributes.push((self.view(ISNULL_ATTRIBUTE), "true".to_string()));
                }
                self.open(self.view(MLVALUE_ELEMENT), &attributes)?;
                if let Some(text) = value {
                    self.text(text)?;
                }
                self.close()
            }
            ViewEvent::StartAssocs { .. } => self.open(self.view(ASSOCIATIONS_ELEMENT), &[]),
            ViewEvent::StartAssoc { assoc_type, .. } => {
                let name = self.element_name(assoc_type)?;
                self.open(name, &[])
            }
            ViewEvent::EndNode { .. }
            | ViewEvent::EndReference { .. }
            | ViewEvent::EndAspects { .. }
            | ViewEvent::EndAcl { .. }
            | ViewEvent::EndValues { .. }
            | ViewEvent::EndProperty { .. }
            | ViewEvent::EndProperties { .. }
            | ViewEvent::EndAssoc { .. }
            | ViewEvent::EndAssocs { .. } => self.close(),
            ViewEvent::End => {
                while !self.open.is_empty() {
                    self.close()?;
                }
                self.flush()
            }
        }
    }
}
