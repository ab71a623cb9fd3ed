use clarity::vm::types::Value;

use crate::indexer::values::builders::{ascii, buffer, list, some, standard_principal, tuple};

pub fn name_print(op: &str, name: &str, namespace: &str) -> Value {
    tuple(vec![(
        "attachment",
        tuple(vec![
            ("hash", buffer(vec![0xb1; 20])),
            ("attachment-index", Value::UInt(1)),
            (
                "metadata",
                tuple(vec![
                    ("name", buffer(name.as_bytes().to_vec())),
                    ("namespace", buffer(namespace.as_bytes().to_vec())),
                    ("op", ascii(op)),
                    ("tx-sender", standard_principal(26, 3)),
                ]),
            ),
        ]),
    )])
}

pub fn namespace_print(namespace: &str, status: &str) -> Value {
    tuple(vec![
        ("namespace", buffer(namespace.as_bytes().to_vec())),
        ("status", ascii(status)),
        (
            "properties",
            tuple(vec![
                ("namespace-import", standard_principal(26, 4)),
                ("revealed-at", Value::UInt(5)),
                ("launched-at", some(Value::UInt(7))),
                ("lifetime", Value::UInt(52595)),
                ("can-update-price-function", Value::Bool(true)),
                (
                    "price-function",
                    tuple(vec![
                        ("buckets", list(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)])),
                        ("base", Value::UInt(4)),
                        ("coeff", Value::UInt(250)),
                        ("nonalpha-discount", Value::UInt(5)),
                        ("no-vowel-discount", Value::UInt(6)),
                    ]),
                ),
            ]),
        ),
    ])
}
