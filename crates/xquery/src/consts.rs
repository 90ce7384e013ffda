pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
pub const FNS: &str = "http://www.w3.org/2005/xpath-functions";
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
pub const HOF_NS: &str = "http://www.w3.org/2005/xpath-functions/hof";
