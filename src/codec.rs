//! JSON codec: decoding JSON into validated objects and encoding objects back
//! to a dict form or JSON text. Both directions are driven by the descriptors
//! of the declared fields and the context's resolver registries.
mod decode;
mod encode;
