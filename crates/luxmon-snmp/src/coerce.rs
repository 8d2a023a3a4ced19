//! PDU value coercion onto declared field types.
//!
//! The tag-to-target mapping is fixed: signed tags fill signed integers or
//! booleans, unsigned tags fill unsigned integers or booleans, octet strings
//! fill strings or byte buffers (always a defensive copy, never an alias of a
//! transport buffer), object identifiers fill strings or [`Oid`] fields.
//! A tag/declared-type mismatch is logged and skipped. The only hard failure
//! is a TruthValue outside `{1, 2}`: that violates the SMI contract and is a
//! programmer error, not a data error.

use std::any::Any;

use crate::oid::Oid;
use crate::pdu::{Pdu, PduValue};
use crate::schema::ScalarSetter;

pub(crate) fn assign(setter: &ScalarSetter, pdu: &Pdu, target: &mut dyn Any, field: &str) {
    let applied = match &pdu.value {
        PduValue::Integer(v) => match setter {
            ScalarSetter::Bool(set) => set(target, truth_value(*v, field)),
            ScalarSetter::Int(set) => set(target, *v),
            other => return mismatch(field, pdu, other.kind_name(), "{bool, i32, i64}"),
        },

        PduValue::Counter32(v)
        | PduValue::Gauge32(v)
        | PduValue::TimeTicks(v)
        | PduValue::Uinteger32(v) => match setter {
            ScalarSetter::Bool(set) => set(target, truth_value(i64::from(*v), field)),
            ScalarSetter::Uint(set) => set(target, u64::from(*v)),
            other => return mismatch(field, pdu, other.kind_name(), "{bool, u32, u64}"),
        },

        PduValue::Counter64(v) => match setter {
            ScalarSetter::Bool(set) => set(target, truth_value(*v as i64, field)),
            ScalarSetter::Uint(set) => set(target, *v),
            other => return mismatch(field, pdu, other.kind_name(), "{bool, u32, u64}"),
        },

        PduValue::OctetString(bytes) => match setter {
            ScalarSetter::Text(set) => set(target, String::from_utf8_lossy(bytes).into_owned()),
            ScalarSetter::Bytes(set) => set(target, bytes.clone()),
            other => return mismatch(field, pdu, other.kind_name(), "{String, Vec<u8>}"),
        },

        PduValue::ObjectIdentifier(text) => match setter {
            ScalarSetter::Text(set) => set(target, text.clone()),
            ScalarSetter::OidValue(set) => match text.parse::<Oid>() {
                Ok(oid) => set(target, oid),
                Err(err) => {
                    // Field is left untouched.
                    tracing::warn!(field, value = %text, %err, "unparseable OID value");
                    return;
                }
            },
            other => return mismatch(field, pdu, other.kind_name(), "{String, Oid}"),
        },

        _ => {
            tracing::warn!(
                field,
                name = %pdu.name,
                tag = pdu.value.tag_name(),
                "unhandled PDU type"
            );
            return;
        }
    };

    if !applied {
        tracing::error!(field, "schema setter does not match record layout");
    }
}

/// TruthValue encoding per RFC 2579: 1 is true, 2 is false. Anything else is
/// a contract violation and panics.
fn truth_value(v: i64, field: &str) -> bool {
    match v {
        1 => true,
        2 => false,
        other => panic!("{field}: TruthValue must be 1 or 2, got {other}"),
    }
}

fn mismatch(field: &str, pdu: &Pdu, declared: &'static str, expected: &'static str) {
    tracing::warn!(
        field,
        tag = pdu.value.tag_name(),
        declared,
        expected,
        "declared field type does not match PDU tag"
    );
}
