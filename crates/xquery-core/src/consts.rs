//! Namespace and collation URIs shared across the engine.

/// W3C namespace for XPath/XQuery error codes (`err:` prefix).
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";
/// XML Schema namespace (`xs:` prefix).
pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
/// Default function namespace (`fn:` prefix).
pub const FNS: &str = "http://www.w3.org/2005/xpath-functions";
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";

pub const CODEPOINT_URI: &str = "http://www.w3.org/2005/xpath-functions/collation/codepoint";
pub const SIMPLE_CASE_URI: &str = "urn:xquery-core:collation:simple-case";
pub const SIMPLE_ACCENT_URI: &str = "urn:xquery-core:collation:simple-accent";
pub const SIMPLE_CASE_ACCENT_URI: &str = "urn:xquery-core:collation:simple-case-accent";
