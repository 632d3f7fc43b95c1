//! Element visitor chain driving the selective attribute capture.
//!
//! One [`ElementVisitor`] frame is pushed per open element. Only the frame of an
//! `<application>` element directly under the document root captures anything, and it
//! commits into [`ManifestProperties`] when its own end event arrives.

use crate::android::binary_xml::{
    AttributeEvent, BinaryXmlError, BinaryXmlResult, ManifestValue, XmlEvent,
};
use crate::android::demand::DemandSet;
use log::{trace, warn};
use std::collections::BTreeMap;

/// Attribute name to typed value, as found on the `<application>` element.
pub type ManifestProperties = BTreeMap<String, ManifestValue>;

pub(crate) const APPLICATION_TAG: &str = "application";

/// The most recent demanded attribute seen on one `<application>` element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingCapture {
    pub name: Option<String>,
    pub value: Option<ManifestValue>,
}

impl PendingCapture {
    fn take_pair(self) -> Option<(String, ManifestValue)> {
        match (self.name, self.value) {
            (Some(name), Some(value)) => Some((name, value)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementVisitor {
    /// The document root element, whatever its tag.
    Manifest,
    Application(PendingCapture),
    /// Anything else; its attributes and children are ignored.
    PassThrough,
}

impl ElementVisitor {
    fn child(&self, name: &str) -> ElementVisitor {
        match self {
            ElementVisitor::Manifest if name == APPLICATION_TAG => {
                ElementVisitor::Application(PendingCapture::default())
            }
            _ => ElementVisitor::PassThrough,
        }
    }
}

/// Stack of visitor frames for the elements currently open.
pub struct VisitorChain<'d, S: AsRef<str>> {
    demands: DemandSet<'d, S>,
    frames: Vec<ElementVisitor>,
    applications_seen: usize,
}

impl<'d, S: AsRef<str>> VisitorChain<'d, S> {
    pub fn new(demands: DemandSet<'d, S>) -> Self {
        VisitorChain {
            demands,
            frames: Vec::new(),
            applications_seen: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn start_element(&mut self, name: &str) {
        let frame = match self.frames.last() {
            Some(parent) => parent.child(name),
            None => ElementVisitor::Manifest,
        };
        if let ElementVisitor::Application(_) = frame {
            self.applications_seen += 1;
            if self.applications_seen > 1 {
                warn!("manifest declares more than one <application>; later values win");
            }
        }
        trace!("enter <{name}> as {frame:?} at depth {}", self.frames.len());
        self.frames.push(frame);
    }

    pub fn attribute(&mut self, attr: AttributeEvent) -> BinaryXmlResult<()> {
        let frame = self.frames.last_mut().ok_or_else(|| {
            BinaryXmlError::MalformedDocument(format!(
                "Attribute {} outside of any element",
                attr.name
            ))
        })?;
        if let ElementVisitor::Application(capture) = frame {
            if self.demands.contains(&attr.name) {
                if let Some(previous) = capture.name.as_deref() {
                    if previous == attr.name {
                        warn!("attribute {} repeated on <application>", attr.name);
                    }
                }
                trace!("captured {} = {:?}", attr.name, attr.value);
                capture.name = Some(attr.name);
                capture.value = attr.value;
            }
        }
        Ok(())
    }

    /// Pops the innermost frame, committing its capture into `properties` if it has one.
    pub fn end_element(&mut self, properties: &mut ManifestProperties) -> BinaryXmlResult<()> {
        let frame = self.frames.pop().ok_or_else(|| {
            BinaryXmlError::MalformedDocument("End element without open element".to_string())
        })?;
        if let ElementVisitor::Application(capture) = frame {
            if let Some((name, value)) = capture.take_pair() {
                trace!("commit {name} = {value:?}");
                properties.insert(name, value);
            }
        }
        Ok(())
    }

    /// Feeds one decoder event into the chain.
    pub fn visit(&mut self, event: XmlEvent, properties: &mut ManifestProperties) -> BinaryXmlResult<()> {
        match event {
            XmlEvent::StartElement { name, .. } => {
                self.start_element(&name);
                Ok(())
            }
            XmlEvent::Attribute(attr) => self.attribute(attr),
            XmlEvent::EndElement { .. } => self.end_element(properties),
        }
    }
}

/// Runs a whole event stream through a fresh chain and returns what was committed.
pub fn collect_properties<I, S>(events: I, demands: DemandSet<'_, S>) -> BinaryXmlResult<ManifestProperties>
where
    I: IntoIterator<Item = BinaryXmlResult<XmlEvent>>,
    S: AsRef<str>,
{
    let mut chain = VisitorChain::new(demands);
    let mut properties = ManifestProperties::new();
    for event in events {
        chain.visit(event?, &mut properties)?;
    }
    if chain.depth() != 0 {
        return Err(BinaryXmlError::MalformedDocument(
            "Event stream ended with open elements".to_string(),
        ));
    }
    Ok(properties)
}
