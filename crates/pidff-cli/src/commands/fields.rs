//! Field map listing.

use openracing_pidff_common::{FieldDescriptor, PidCapabilities, ReportFieldMap, ReportLayout};
use serde::Serialize;

use crate::commands::{FieldsArgs, load_descriptor};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
pub struct FieldListing {
    pub reports: Vec<ReportLayout>,
    pub fields: Vec<FieldDescriptor>,
    pub capabilities: PidCapabilities,
}

pub fn execute(args: &FieldsArgs, json: bool) -> Result<(), CliError> {
    let descriptor = load_descriptor(&args.descriptor)?;
    let map = ReportFieldMap::from_descriptor(&descriptor)?;
    let listing = listing(&map, args.report);
    output::print_field_listing(&listing, json)
}

pub fn listing(map: &ReportFieldMap, report_id: Option<u8>) -> FieldListing {
    let wanted = |id: u8| report_id.is_none_or(|r| r == id);
    FieldListing {
        reports: map
            .reports()
            .filter(|r| wanted(r.report_id))
            .cloned()
            .collect(),
        fields: map
            .fields()
            .filter(|f| wanted(f.report_id))
            .cloned()
            .collect(),
        capabilities: map.capabilities().clone(),
    }
}
