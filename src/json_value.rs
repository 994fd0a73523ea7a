//! Structural equality over JSON values, used for key matching when merging
//! entries.
//!
//! DecSync uses `serde_json::Value` directly as its value model rather than
//! a bespoke tagged enum: it already has the right shape (null, bool,
//! number, string, array, object) and is the JSON type the rest of the
//! crate already serializes entries with.

pub use serde_json::Value;

/// Structural equality matching the spec: numbers compare by numeric value
/// after normalization (so `5` and `5.0` are equal), arrays are
/// position-sensitive, objects compare by key set with recursive value
/// equality, everything else falls back to `false` across variants.
pub fn equals_json(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Null, Value::Null) => true,
		(Value::Bool(x), Value::Bool(y)) => x == y,
		(Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
		(Value::String(x), Value::String(y)) => x == y,
		(Value::Array(x), Value::Array(y)) => {
			x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| equals_json(a, b))
		}
		(Value::Object(x), Value::Object(y)) => {
			x.len() == y.len()
				&& x.iter().all(|(k, v)| y.get(k).is_some_and(|v2| equals_json(v, v2)))
		}
		_ => false,
	}
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
	if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
		return x == y;
	}
	match (a.as_f64(), b.as_f64()) {
		(Some(x), Some(y)) => x == y,
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn reflexive_for_every_variant() {
		for v in [
			json!(null),
			json!(true),
			json!(42),
			json!(4.5),
			json!("hi"),
			json!([1, 2, "x"]),
			json!({"a": 1, "b": [true, null]}),
		] {
			assert!(equals_json(&v, &v));
		}
	}

	#[test]
	fn symmetric() {
		let pairs = [
			(json!(1), json!(1.0)),
			(json!({"a": 1}), json!({"a": 2})),
			(json!([1, 2]), json!([2, 1])),
			(json!("x"), json!("x")),
		];
		for (a, b) in pairs {
			assert_eq!(equals_json(&a, &b), equals_json(&b, &a));
		}
	}

	#[test]
	fn integer_and_float_representations_of_same_number_are_equal() {
		assert!(equals_json(&json!(5), &json!(5.0)));
	}

	#[test]
	fn arrays_are_position_sensitive() {
		assert!(!equals_json(&json!([1, 2]), &json!([2, 1])));
		assert!(equals_json(&json!([1, 2]), &json!([1, 2])));
	}

	#[test]
	fn objects_compare_by_key_set_ignoring_order() {
		assert!(equals_json(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
		assert!(!equals_json(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
	}

	#[test]
	fn different_variants_are_never_equal() {
		assert!(!equals_json(&json!(null), &json!(false)));
		assert!(!equals_json(&json!(1), &json!("1")));
		assert!(!equals_json(&json!([1]), &json!({"0": 1})));
	}
}

// vim: ts=4
