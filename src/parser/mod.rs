//! MIME parsing: body selection, attachment enumeration, HTML conversion.

pub mod mime;
