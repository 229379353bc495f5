pub mod airtable;

pub use airtable::import_airtable;
