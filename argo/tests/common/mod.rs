#![allow(dead_code)]

use argo::cfa::description::CfaDescription;
use argo::cfa::{Cfa, CfaBuilder, Expr};
use tracing_subscriber::EnvFilter;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `i = 0; while (i < 10) { i = i + 1; if (i == 3) error; }`, described in JSON.
pub const COUNTING_LOOP: &str = r#"{
    "functions": [
        {
            "name": "main",
            "nodes": [
                { "name": "head" },
                { "name": "body" },
                { "name": "check" },
                { "name": "err", "error": true }
            ],
            "edges": [
                { "from": "entry", "to": "head", "kind": "assign", "var": "i",
                  "expr": { "const": 0 } },
                { "from": "head", "to": "body", "kind": "assume",
                  "expr": { "binary": ["lt", { "var": "i" }, { "const": 10 }] } },
                { "from": "head", "to": "exit", "kind": "assume", "truth": false,
                  "expr": { "binary": ["lt", { "var": "i" }, { "const": 10 }] } },
                { "from": "body", "to": "check", "kind": "assign", "var": "i",
                  "expr": { "binary": ["add", { "var": "i" }, { "const": 1 }] } },
                { "from": "check", "to": "err", "kind": "assume",
                  "expr": { "binary": ["eq", { "var": "i" }, { "const": 3 }] } },
                { "from": "check", "to": "head", "kind": "assume", "truth": false,
                  "expr": { "binary": ["eq", { "var": "i" }, { "const": 3 }] } }
            ]
        }
    ]
}"#;

pub fn counting_loop() -> Cfa {
    let description: CfaDescription = serde_json::from_str(COUNTING_LOOP).unwrap();
    description.build().unwrap()
}

/// `x = 0; if (y == 1) x = 1; if (x == 2) error;`
///
/// The two branches meet again before the check, which is where merging matters.
pub fn diamond() -> Cfa {
    let mut b = CfaBuilder::new();
    let main = b.add_function("main").unwrap();
    let branch = b.add_node("main").unwrap();
    let then = b.add_node("main").unwrap();
    let join = b.add_node("main").unwrap();
    let error = b.add_node("main").unwrap();
    b.mark_error(error).unwrap();
    b.assign(main.entry, branch, "x", Expr::constant(0)).unwrap();
    let y_is_one = Expr::var("y").equals(Expr::constant(1));
    b.assume(branch, then, y_is_one.clone(), true).unwrap();
    b.assume(branch, join, y_is_one, false).unwrap();
    b.assign(then, join, "x", Expr::constant(1)).unwrap();
    let x_is_two = Expr::var("x").equals(Expr::constant(2));
    b.assume(join, error, x_is_two.clone(), true).unwrap();
    b.assume(join, main.exit, x_is_two, false).unwrap();
    b.build("main").unwrap()
}

/// `v = 1; inc(); inc(); if (v == 3) error;` where `inc` increments `v`.
pub const CALLS: &str = r#"{
    "functions": [
        {
            "name": "main",
            "nodes": [
                { "name": "first" },
                { "name": "second" },
                { "name": "check" },
                { "name": "err", "error": true }
            ],
            "edges": [
                { "from": "entry", "to": "first", "kind": "assign", "var": "v",
                  "expr": { "const": 1 } },
                { "from": "first", "to": "second", "kind": "call", "callee": "inc" },
                { "from": "second", "to": "check", "kind": "call", "callee": "inc" },
                { "from": "check", "to": "err", "kind": "assume",
                  "expr": { "binary": ["eq", { "var": "v" }, { "const": 3 }] } },
                { "from": "check", "to": "exit", "kind": "assume", "truth": false,
                  "expr": { "binary": ["eq", { "var": "v" }, { "const": 3 }] } }
            ]
        },
        {
            "name": "inc",
            "edges": [
                { "from": "entry", "to": "exit", "kind": "assign", "var": "v",
                  "expr": { "binary": ["add", { "var": "v" }, { "const": 1 }] } }
            ]
        }
    ]
}"#;

pub fn calls() -> Cfa {
    let description: CfaDescription = serde_json::from_str(CALLS).unwrap();
    description.build().unwrap()
}
