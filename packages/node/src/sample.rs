//! The sample value graph a node maps when `RESTMAP_SAMPLE` is on.
//!
//! | Prefix | Value | Access |
//! |--------|-------|--------|
//! | `/mutable/` | [`Sample`] | read-write |
//! | `/readonly/` | [`Sample`] snapshot | read-only |
//! | `/int/` | `i64`, initially `0` | read-write |
//! | `/str/` | `"test"` | read-only |

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use restmap::Registry;

pub struct Sample {
    pub string: String,
    pub numbers: Vec<i64>,
    pub map: HashMap<String, bool>,
}

restmap::record!(Sample {
    string as "String",
    numbers as "Numbers",
    map as "Map",
});

impl Default for Sample {
    fn default() -> Self {
        Self {
            string: "teststr".into(),
            numbers: vec![6, 9, 42],
            map: HashMap::from([("true".into(), true), ("false".into(), false)]),
        }
    }
}

/// Handles to the mutable sample values, for callers that want to observe or
/// change them outside of HTTP.
pub struct Mounted {
    pub mutable: Arc<RwLock<Sample>>,
    pub int: Arc<RwLock<i64>>,
}

/// Map the sample values into `registry`.
pub fn mount(registry: &Registry) -> Result<Mounted, restmap::Error> {
    let mutable = Arc::new(RwLock::new(Sample::default()));
    let int = Arc::new(RwLock::new(0i64));

    registry.map("/mutable", Arc::clone(&mutable))?;
    registry.map_snapshot("/readonly", Sample::default())?;
    registry.map("/int", Arc::clone(&int))?;
    registry.map_snapshot("/str", String::from("test"))?;

    Ok(Mounted { mutable, int })
}
