//! Value graphs shared by unit tests.

use std::collections::HashMap;

pub struct Sample {
    pub string: String,
    pub numbers: Vec<i64>,
    pub map: HashMap<String, bool>,
}

crate::record!(Sample {
    string as "String",
    numbers as "Numbers",
    map as "Map",
});

pub fn sample() -> Sample {
    Sample {
        string: "teststr".into(),
        numbers: vec![6, 9, 42],
        map: HashMap::from([("true".into(), true), ("false".into(), false)]),
    }
}

pub const SAMPLE_JSON: &str =
    r#"{"String":"teststr","Numbers":[6,9,42],"Map":{"false":false,"true":true}}"#;
