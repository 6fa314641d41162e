//! Payload entry points
//!
//! Convenience functions that encode or decode a complete payload: the
//! top-level instance references or exception, followed by the
//! pending-instance section.

use bytes::Bytes;
use tracing::trace;

use crate::exception::{RaisedException, UserException};
use crate::graph::{is_a, Graph, Handle};
use crate::registry::TypeRegistry;
use crate::{InputStream, OutputStream, Result, WireError};

/// Encode top-level references to instances of `graph`.
///
/// Every instance reachable from `roots` is included exactly once, however
/// many times it is referenced.
pub fn encode_values(graph: &Graph, roots: &[Option<Handle>]) -> Result<Bytes> {
    let mut out = OutputStream::with_graph(graph);
    for root in roots {
        out.write_instance(*root)?;
    }
    let bytes = out.finish()?;
    trace!("encoded {} values into {} bytes", roots.len(), bytes.len());
    Ok(bytes)
}

/// Decode `count` top-level instance references and the instances they reach
pub fn decode_values(
    bytes: Bytes,
    registry: &TypeRegistry,
    count: usize,
) -> Result<(Graph, Vec<Option<Handle>>)> {
    let mut input = InputStream::new(bytes, registry);
    let mut roots = Vec::with_capacity(count);
    for _ in 0..count {
        roots.push(input.read_instance()?);
    }
    let graph = input.finish()?;
    Ok((graph, roots))
}

/// Decode a single instance reference whose declared type is `expected_type`.
///
/// Fails with [`WireError::TypeMismatch`] if the decoded instance is not an
/// `expected_type` once slicing has been applied.
pub fn decode_value(
    bytes: Bytes,
    registry: &TypeRegistry,
    expected_type: &str,
) -> Result<(Graph, Option<Handle>)> {
    let (graph, roots) = decode_values(bytes, registry, 1)?;
    let root = roots.into_iter().next().flatten();
    if let Some(handle) = root {
        let value = graph.get(handle)?;
        if !is_a(value, expected_type) {
            return Err(WireError::TypeMismatch {
                expected: expected_type.to_string(),
                actual: value.type_name().to_string(),
            });
        }
    }
    Ok((graph, root))
}

/// Encode a user exception; `graph` holds any instances its fields reference
pub fn encode_exception(exception: &dyn UserException, graph: Option<&Graph>) -> Result<Bytes> {
    let mut out = match graph {
        Some(graph) => OutputStream::with_graph(graph),
        None => OutputStream::new(),
    };
    out.write_exception(exception)?;
    out.finish()
}

/// Decode a user exception, sliced to its most-derived locally known type.
///
/// Fails with [`WireError::UnknownUserException`] if none of its slices is
/// registered.
pub fn decode_exception(bytes: Bytes, registry: &TypeRegistry) -> Result<RaisedException> {
    let mut input = InputStream::new(bytes, registry);
    let (exception, sliced) = input.read_exception()?;
    let graph = input.finish()?;
    Ok(RaisedException::new(exception, graph, sliced))
}
