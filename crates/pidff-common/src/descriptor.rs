//! Parsed HID report descriptor tree.
//!
//! Byte-level descriptor parsing happens outside this crate. What reaches
//! [`ReportFieldMap`](crate::field_map::ReportFieldMap) is this tree: nested
//! collections holding main items with their resolved global and local
//! state. Fixtures build it with [`DescriptorBuilder`], tools load it from
//! JSON or YAML.

use bitflags::bitflags;
use pidff_errors::{DeviceError, PidffResult};
use serde::{Deserialize, Serialize};

use crate::usage::Usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Input,
    Output,
    Feature,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Feature => "feature",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Physical,
    Application,
    Logical,
    Report,
    NamedArray,
    UsageSwitch,
    UsageModifier,
}

/// One main item with the global and local state in effect for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportItem {
    pub kind: ReportKind,
    #[serde(default)]
    pub report_id: u8,
    #[serde(default)]
    pub usages: Vec<Usage>,
    pub report_size: u32,
    pub report_count: u32,
    #[serde(default)]
    pub logical_min: i32,
    #[serde(default)]
    pub logical_max: i32,
    #[serde(default)]
    pub physical_min: i32,
    #[serde(default)]
    pub physical_max: i32,
    #[serde(default)]
    pub unit: u32,
    #[serde(default)]
    pub unit_exponent: i8,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_constant: bool,
}

impl ReportItem {
    /// Bits the item occupies in its report.
    pub fn bit_len(&self) -> u32 {
        self.report_size.saturating_mul(self.report_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub kind: CollectionKind,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Collection(Collection),
    Item(ReportItem),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDescriptor {
    pub nodes: Vec<Node>,
}

impl ReportDescriptor {
    pub fn from_json_str(text: &str) -> PidffResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| DeviceError::descriptor(format!("invalid JSON descriptor: {e}")).into())
    }

    pub fn from_yaml_str(text: &str) -> PidffResult<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| DeviceError::descriptor(format!("invalid YAML descriptor: {e}")).into())
    }

    /// Depth-first walk over every item with its enclosing collections,
    /// outermost first.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&[&'a Collection], &'a ReportItem)) {
        fn recurse<'a>(
            nodes: &'a [Node],
            stack: &mut Vec<&'a Collection>,
            visit: &mut dyn FnMut(&[&'a Collection], &'a ReportItem),
        ) {
            for node in nodes {
                match node {
                    Node::Item(item) => visit(stack, item),
                    Node::Collection(collection) => {
                        stack.push(collection);
                        recurse(&collection.children, stack, visit);
                        stack.pop();
                    }
                }
            }
        }

        let mut stack = Vec::new();
        recurse(&self.nodes, &mut stack, &mut visit);
    }
}

bitflags! {
    /// Data bits of an Input, Output or Feature main item.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ItemFlags: u32 {
        const CONSTANT = 0x01;
        const VARIABLE = 0x02;
        const RELATIVE = 0x04;
        const WRAP = 0x08;
        const NON_LINEAR = 0x10;
        const NO_PREFERRED = 0x20;
        const NULL_STATE = 0x40;
        const VOLATILE = 0x80;
    }
}

impl ItemFlags {
    /// Data, Array, Absolute
    pub const DATA_ARRAY: Self = Self::empty();
    /// Data, Variable, Absolute
    pub const DATA_VAR: Self = Self::VARIABLE;
    /// Constant, Variable, Absolute (padding)
    pub const PADDING: Self = Self::CONSTANT.union(Self::VARIABLE);
}

#[derive(Debug, Clone, Copy, Default)]
struct Globals {
    usage_page: u16,
    logical_min: i32,
    logical_max: i32,
    physical_min: i32,
    physical_max: i32,
    unit: u32,
    unit_exponent: i8,
    report_size: u32,
    report_count: u32,
    report_id: u8,
}

/// Builds a [`ReportDescriptor`] the way a descriptor listing reads.
///
/// Global items (usage page, ranges, unit, size, count, report id) stay in
/// effect until changed. Usages are local: every main item, collections
/// included, consumes the usages declared since the previous one.
///
/// ```
/// use openracing_pidff_common::descriptor::{CollectionKind, DescriptorBuilder, ItemFlags};
/// use openracing_pidff_common::usage::{page, pid};
///
/// let descriptor = DescriptorBuilder::new()
///     .usage_page(page::PID)
///     .usage_of(pid::DEVICE_GAIN_REPORT)
///     .collection(CollectionKind::Logical)
///     .report_id(8)
///     .usage_of(pid::DEVICE_GAIN)
///     .logical(0, 255)
///     .physical(0, 10_000)
///     .report_size(8)
///     .report_count(1)
///     .output(ItemFlags::DATA_VAR)
///     .end_collection()
///     .build()?;
/// assert_eq!(descriptor.nodes.len(), 1);
/// # Ok::<(), pidff_errors::PidffError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DescriptorBuilder {
    roots: Vec<Node>,
    open: Vec<Collection>,
    globals: Globals,
    usages: Vec<Usage>,
    unbalanced: usize,
}

impl DescriptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn usage_page(mut self, page: u16) -> Self {
        self.globals.usage_page = page;
        self
    }

    /// Local usage on the current usage page.
    pub fn usage(mut self, id: u16) -> Self {
        self.usages.push(Usage::new(self.globals.usage_page, id));
        self
    }

    /// Local usage with an explicit page.
    pub fn usage_of(mut self, usage: Usage) -> Self {
        self.usages.push(usage);
        self
    }

    pub fn usage_range(mut self, min: u16, max: u16) -> Self {
        let page = self.globals.usage_page;
        self.usages.extend((min..=max).map(|id| Usage::new(page, id)));
        self
    }

    pub fn logical(mut self, min: i32, max: i32) -> Self {
        self.globals.logical_min = min;
        self.globals.logical_max = max;
        self
    }

    pub fn physical(mut self, min: i32, max: i32) -> Self {
        self.globals.physical_min = min;
        self.globals.physical_max = max;
        self
    }

    pub fn unit(mut self, unit: u32) -> Self {
        self.globals.unit = unit;
        self
    }

    pub fn unit_exponent(mut self, exponent: i8) -> Self {
        self.globals.unit_exponent = exponent;
        self
    }

    pub fn report_size(mut self, bits: u32) -> Self {
        self.globals.report_size = bits;
        self
    }

    pub fn report_count(mut self, count: u32) -> Self {
        self.globals.report_count = count;
        self
    }

    pub fn report_id(mut self, id: u8) -> Self {
        self.globals.report_id = id;
        self
    }

    pub fn collection(mut self, kind: CollectionKind) -> Self {
        let usage = self.usages.first().copied();
        self.usages.clear();
        self.open.push(Collection {
            kind,
            usage,
            children: Vec::new(),
        });
        self
    }

    pub fn end_collection(mut self) -> Self {
        self.usages.clear();
        if let Some(done) = self.open.pop() {
            self.push_node(Node::Collection(done));
        } else {
            self.unbalanced = self.unbalanced.saturating_add(1);
        }
        self
    }

    pub fn input(self, flags: ItemFlags) -> Self {
        self.main_item(ReportKind::Input, flags)
    }

    pub fn output(self, flags: ItemFlags) -> Self {
        self.main_item(ReportKind::Output, flags)
    }

    pub fn feature(self, flags: ItemFlags) -> Self {
        self.main_item(ReportKind::Feature, flags)
    }

    fn main_item(mut self, kind: ReportKind, flags: ItemFlags) -> Self {
        let g = self.globals;
        let item = ReportItem {
            kind,
            report_id: g.report_id,
            usages: std::mem::take(&mut self.usages),
            report_size: g.report_size,
            report_count: g.report_count,
            logical_min: g.logical_min,
            logical_max: g.logical_max,
            physical_min: g.physical_min,
            physical_max: g.physical_max,
            unit: g.unit,
            unit_exponent: g.unit_exponent,
            is_array: !flags.contains(ItemFlags::VARIABLE),
            is_constant: flags.contains(ItemFlags::CONSTANT),
        };
        self.push_node(Node::Item(item));
        self
    }

    fn push_node(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    pub fn build(self) -> PidffResult<ReportDescriptor> {
        if !self.open.is_empty() {
            return Err(DeviceError::descriptor(format!(
                "{} collection(s) left open",
                self.open.len()
            ))
            .into());
        }
        if self.unbalanced > 0 {
            return Err(DeviceError::descriptor(format!(
                "{} END_COLLECTION item(s) without a matching collection",
                self.unbalanced
            ))
            .into());
        }
        Ok(ReportDescriptor { nodes: self.roots })
    }
}
