//! `text` target module

use serde_json::{Map, Value};

use crate::registry::{Args, CallError, Module, Returns};

pub fn module() -> Module {
    Module::new("text")
        .function("upper", &["s"], |args| {
            let s: String = args.get("s")?;
            Returns::single(s.to_uppercase())
        })
        .function("lower", &["s"], |args| {
            let s: String = args.get("s")?;
            Returns::single(s.to_lowercase())
        })
        .function("length", &["s"], |args| {
            let s: String = args.get("s")?;
            Returns::single(s.chars().count())
        })
        .function("concat", &["a", "b", "sep"], |args| {
            let a: String = args.get("a")?;
            let b: String = args.get("b")?;
            let sep: String = args.get_or("sep", String::new())?;
            Returns::single(format!("{a}{sep}{b}"))
        })
        .function("repeat", &["s", "n"], |args| {
            let s: String = args.get("s")?;
            let n: usize = args.get("n")?;
            Returns::single(s.repeat(n))
        })
        .function("split", &["s", "sep"], split)
        .function("partition", &["s", "sep"], partition)
        .function("word_count", &["s"], word_count)
        .function("is_palindrome", &["s"], |args| {
            let s: String = args.get("s")?;
            let letters: Vec<char> = s
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            Returns::single(letters.iter().eq(letters.iter().rev()))
        })
}

/// Split on `sep`, or on runs of whitespace when `sep` is absent or null.
fn split(args: &Args<'_>) -> Result<Returns, CallError> {
    let s: String = args.get("s")?;
    let sep: Option<String> = args.get_or("sep", None)?;

    let parts: Vec<&str> = match sep.as_deref() {
        None => s.split_whitespace().collect(),
        Some("") => return Err(CallError::failed("empty separator")),
        Some(sep) => s.split(sep).collect(),
    };
    Returns::single(parts)
}

/// `(head, sep, tail)` around the first occurrence of `sep`.
fn partition(args: &Args<'_>) -> Result<Returns, CallError> {
    let s: String = args.get("s")?;
    let sep: String = args.get("sep")?;
    if sep.is_empty() {
        return Err(CallError::failed("empty separator"));
    }

    match s.split_once(sep.as_str()) {
        Some((head, tail)) => Returns::tuple((head, sep.as_str(), tail)),
        None => Returns::tuple((s.as_str(), "", "")),
    }
}

/// Occurrences of each whitespace-separated word, in first-seen order.
fn word_count(args: &Args<'_>) -> Result<Returns, CallError> {
    let s: String = args.get("s")?;
    let mut counts = Map::new();
    for word in s.split_whitespace() {
        let entry = counts.entry(word.to_string()).or_insert(Value::from(0u64));
        let next = entry.as_u64().unwrap_or(0) + 1;
        *entry = Value::from(next);
    }
    Ok(Returns::Single(Value::Object(counts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, params: Value) -> Result<Vec<Value>, CallError> {
        let Value::Object(params) = params else {
            panic!("params must be an object");
        };
        module().resolve(name).unwrap().call(&params).map(Returns::into_values)
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(call("upper", json!({"s": "abc"})).unwrap(), vec![json!("ABC")]);
        assert_eq!(call("lower", json!({"s": "ÀB"})).unwrap(), vec![json!("àb")]);
    }

    #[test]
    fn test_length_counts_characters() {
        assert_eq!(call("length", json!({"s": "héllo"})).unwrap(), vec![json!(5)]);
    }

    #[test]
    fn test_concat_with_optional_separator() {
        assert_eq!(call("concat", json!({"a": "x", "b": "y"})).unwrap(), vec![json!("xy")]);
        assert_eq!(
            call("concat", json!({"a": "x", "b": "y", "sep": "-"})).unwrap(),
            vec![json!("x-y")]
        );
    }

    #[test]
    fn test_split_returns_one_list_value() {
        assert_eq!(
            call("split", json!({"s": "  a b\tc "})).unwrap(),
            vec![json!(["a", "b", "c"])]
        );
        assert_eq!(
            call("split", json!({"s": "a,,b", "sep": ","})).unwrap(),
            vec![json!(["a", "", "b"])]
        );
        assert_eq!(
            call("split", json!({"s": "a b", "sep": null})).unwrap(),
            vec![json!(["a", "b"])]
        );
        assert!(call("split", json!({"s": "a", "sep": ""})).is_err());
    }

    #[test]
    fn test_partition_returns_three_values() {
        assert_eq!(
            call("partition", json!({"s": "key=value=x", "sep": "="})).unwrap(),
            vec![json!("key"), json!("="), json!("value=x")]
        );
        assert_eq!(
            call("partition", json!({"s": "plain", "sep": "="})).unwrap(),
            vec![json!("plain"), json!(""), json!("")]
        );
    }

    #[test]
    fn test_word_count() {
        assert_eq!(
            call("word_count", json!({"s": "a b a"})).unwrap(),
            vec![json!({"a": 2, "b": 1})]
        );
    }

    #[test]
    fn test_palindrome() {
        assert_eq!(
            call("is_palindrome", json!({"s": "A man, a plan, a canal: Panama"})).unwrap(),
            vec![json!(true)]
        );
        assert_eq!(call("is_palindrome", json!({"s": "abc"})).unwrap(), vec![json!(false)]);
    }
}
