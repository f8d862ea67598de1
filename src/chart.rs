//! Read-only chart data the evaluator resolves property paths against.
//!
//! A [`ChartContext`] is a snapshot of one computed chart: a body table
//! (`Sun`, `Moon`, `Mars`, `House_10_Cusp`, ...) of fixed-shape
//! [`PropertyBag`]s plus the chart's [`Aspect`] list. It is built once by
//! the ephemeris side of the application and never mutated afterwards;
//! evaluation only ever sees `&ChartContext`, so one context can serve any
//! number of concurrent formula evaluations.
//!
//! Body enumeration order is insertion order, fixed at construction. The
//! aggregator builtins depend on that order being stable.

use ahash::AHashMap;

use crate::error::ChartError;
use crate::value::Value;

/// Fixed-shape record of one body's computed attributes.
///
/// The shape is fixed at construction instead of being a free-form map, so
/// field access is a typed lookup rather than runtime type inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBag {
    /// Zodiac sign the body sits in ("Aries" ... "Pisces").
    pub sign: String,
    /// House number, 1-12.
    pub house: u8,
    /// Degree within the sign, 0-30.
    pub degree: f64,
    /// Daily motion in degrees; negative while retrograde.
    pub speed: f64,
    /// Whether the body is in retrograde motion.
    pub retrograde: bool,
    /// Ecliptic longitude, 0-360.
    pub absolute_degree: f64,
}

impl PropertyBag {
    /// Look up a field by its formula-visible name. Names are
    /// case-sensitive; an unknown name returns `None` and the evaluator
    /// turns that into an `UnknownProperty` error.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "Sign" => Some(Value::Str(self.sign.clone())),
            "House" => Some(Value::Number(f64::from(self.house))),
            "Degree" => Some(Value::Number(self.degree)),
            "Speed" => Some(Value::Number(self.speed)),
            "Retrograde" => Some(Value::Bool(self.retrograde)),
            "AbsoluteDegree" => Some(Value::Number(self.absolute_degree)),
            _ => None,
        }
    }
}

/// An angular relationship between two bodies, as computed by the
/// ephemeris collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Aspect {
    pub first: String,
    pub second: String,
    /// Aspect kind ("Conjunction", "Trine", ...); compared case-sensitively.
    pub kind: String,
    /// Deviation from exactness, in degrees.
    pub orb: f64,
    /// True while the aspect is still tightening toward exact.
    pub applying: bool,
}

impl Aspect {
    /// Whether this aspect links the unordered pair `{a, b}`.
    pub fn links(&self, a: &str, b: &str) -> bool {
        (self.first == a && self.second == b) || (self.first == b && self.second == a)
    }
}

/// One chart's bodies and aspects, in a fixed enumeration order.
#[derive(Debug, Clone, Default)]
pub struct ChartContext {
    bodies: Vec<(String, PropertyBag)>,
    index: AHashMap<String, usize>,
    aspects: Vec<Aspect>,
}

impl ChartContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body. Re-inserting an existing name replaces its bag but
    /// keeps the original enumeration position.
    pub fn insert_body(&mut self, name: impl Into<String>, bag: PropertyBag) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => self.bodies[i].1 = bag,
            None => {
                self.index.insert(name.clone(), self.bodies.len());
                self.bodies.push((name, bag));
            }
        }
    }

    pub fn push_aspect(&mut self, aspect: Aspect) {
        self.aspects.push(aspect);
    }

    /// Look up one body by exact name.
    pub fn body(&self, name: &str) -> Option<&PropertyBag> {
        self.index.get(name).map(|&i| &self.bodies[i].1)
    }

    /// Bodies in insertion order.
    pub fn bodies(&self) -> impl Iterator<Item = (&str, &PropertyBag)> {
        self.bodies.iter().map(|(name, bag)| (name.as_str(), bag))
    }

    pub fn aspects(&self) -> &[Aspect] {
        &self.aspects
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Build a context from a JSON document of the shape
    ///
    /// ```json
    /// {
    ///   "bodies": {
    ///     "Sun": {"sign": "Leo", "house": 10, "degree": 12.5,
    ///             "speed": 0.95, "retrograde": false, "absolute_degree": 132.5}
    ///   },
    ///   "aspects": [
    ///     {"first": "Sun", "second": "Moon", "kind": "Trine",
    ///      "orb": 2.1, "applying": true}
    ///   ]
    /// }
    /// ```
    ///
    /// Body order in the document becomes the context's enumeration order
    /// (`serde_json` is built with `preserve_order`). The `aspects` key is
    /// optional.
    pub fn from_json(doc: &serde_json::Value) -> Result<Self, ChartError> {
        let root = doc.as_object().ok_or(ChartError::NotAnObject)?;

        let mut context = ChartContext::new();

        let bodies = root
            .get("bodies")
            .and_then(|b| b.as_object())
            .ok_or_else(|| ChartError::WrongType {
                location: "bodies".to_string(),
                expected: "an object of body records".to_string(),
            })?;

        for (name, record) in bodies {
            context.insert_body(name.clone(), bag_from_json(name, record)?);
        }

        if let Some(aspects) = root.get("aspects") {
            let list = aspects.as_array().ok_or_else(|| ChartError::WrongType {
                location: "aspects".to_string(),
                expected: "an array of aspect records".to_string(),
            })?;
            for (i, record) in list.iter().enumerate() {
                context.push_aspect(aspect_from_json(i, record)?);
            }
        }

        Ok(context)
    }
}

fn bag_from_json(body: &str, record: &serde_json::Value) -> Result<PropertyBag, ChartError> {
    let fields = record.as_object().ok_or_else(|| ChartError::WrongType {
        location: format!("bodies.{body}"),
        expected: "an object".to_string(),
    })?;

    let missing = |field: &str| ChartError::MissingField {
        body: body.to_string(),
        field: field.to_string(),
    };
    let wrong = |field: &str, expected: &str| ChartError::WrongType {
        location: format!("bodies.{body}.{field}"),
        expected: expected.to_string(),
    };

    let str_field = |field: &str| -> Result<String, ChartError> {
        let v = fields.get(field).ok_or_else(|| missing(field))?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| wrong(field, "a string"))
    };
    let num_field = |field: &str| -> Result<f64, ChartError> {
        let v = fields.get(field).ok_or_else(|| missing(field))?;
        v.as_f64().ok_or_else(|| wrong(field, "a number"))
    };
    let bool_field = |field: &str| -> Result<bool, ChartError> {
        let v = fields.get(field).ok_or_else(|| missing(field))?;
        v.as_bool().ok_or_else(|| wrong(field, "a boolean"))
    };

    let house = num_field("house")?;
    if house < 1.0 || house > 12.0 || house.fract() != 0.0 {
        return Err(wrong("house", "a whole number from 1 to 12"));
    }

    Ok(PropertyBag {
        sign: str_field("sign")?,
        house: house as u8,
        degree: num_field("degree")?,
        speed: num_field("speed")?,
        retrograde: bool_field("retrograde")?,
        absolute_degree: num_field("absolute_degree")?,
    })
}

fn aspect_from_json(i: usize, record: &serde_json::Value) -> Result<Aspect, ChartError> {
    let fields = record.as_object().ok_or_else(|| ChartError::WrongType {
        location: format!("aspects[{i}]"),
        expected: "an object".to_string(),
    })?;

    let get = |field: &str| -> Result<&serde_json::Value, ChartError> {
        fields.get(field).ok_or_else(|| ChartError::MissingField {
            body: format!("aspects[{i}]"),
            field: field.to_string(),
        })
    };
    let wrong = |field: &str, expected: &str| ChartError::WrongType {
        location: format!("aspects[{i}].{field}"),
        expected: expected.to_string(),
    };

    Ok(Aspect {
        first: get("first")?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| wrong("first", "a string"))?,
        second: get("second")?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| wrong("second", "a string"))?,
        kind: get("kind")?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| wrong("kind", "a string"))?,
        orb: get("orb")?.as_f64().ok_or_else(|| wrong("orb", "a number"))?,
        applying: get("applying")?
            .as_bool()
            .ok_or_else(|| wrong("applying", "a boolean"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sun() -> PropertyBag {
        PropertyBag {
            sign: "Leo".to_string(),
            house: 10,
            degree: 12.5,
            speed: 0.95,
            retrograde: false,
            absolute_degree: 132.5,
        }
    }

    #[test]
    fn field_lookup_is_case_sensitive() {
        let bag = sun();
        assert_eq!(bag.field("Sign"), Some(Value::Str("Leo".to_string())));
        assert_eq!(bag.field("sign"), None);
        assert_eq!(bag.field("House"), Some(Value::Number(10.0)));
        assert_eq!(bag.field("Retrograde"), Some(Value::Bool(false)));
    }

    #[test]
    fn bodies_enumerate_in_insertion_order() {
        let mut context = ChartContext::new();
        context.insert_body("Sun", sun());
        context.insert_body("Moon", sun());
        context.insert_body("Mars", sun());

        let names: Vec<&str> = context.bodies().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Sun", "Moon", "Mars"]);
    }

    #[test]
    fn reinsert_replaces_without_reordering() {
        let mut context = ChartContext::new();
        context.insert_body("Sun", sun());
        context.insert_body("Moon", sun());

        let mut replacement = sun();
        replacement.sign = "Virgo".to_string();
        context.insert_body("Sun", replacement);

        let names: Vec<&str> = context.bodies().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Sun", "Moon"]);
        assert_eq!(context.body("Sun").unwrap().sign, "Virgo");
        assert_eq!(context.body_count(), 2);
    }

    #[test]
    fn aspect_links_either_direction() {
        let aspect = Aspect {
            first: "Sun".to_string(),
            second: "Moon".to_string(),
            kind: "Trine".to_string(),
            orb: 2.0,
            applying: true,
        };
        assert!(aspect.links("Sun", "Moon"));
        assert!(aspect.links("Moon", "Sun"));
        assert!(!aspect.links("Sun", "Mars"));
    }

    #[test]
    fn from_json_round_trip() {
        let doc: serde_json::Value = serde_json::from_str(
            r#"{
                "bodies": {
                    "Sun": {"sign": "Leo", "house": 10, "degree": 12.5,
                            "speed": 0.95, "retrograde": false, "absolute_degree": 132.5},
                    "Mars": {"sign": "Aries", "house": 1, "degree": 3.0,
                             "speed": -0.2, "retrograde": true, "absolute_degree": 3.0}
                },
                "aspects": [
                    {"first": "Sun", "second": "Mars", "kind": "Square",
                     "orb": 1.4, "applying": false}
                ]
            }"#,
        )
        .unwrap();

        let context = ChartContext::from_json(&doc).unwrap();
        let names: Vec<&str> = context.bodies().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Sun", "Mars"]);
        assert!(context.body("Mars").unwrap().retrograde);
        assert_eq!(context.aspects().len(), 1);
        assert_eq!(context.aspects()[0].kind, "Square");
    }

    #[test]
    fn from_json_reports_missing_fields() {
        let doc: serde_json::Value =
            serde_json::from_str(r#"{"bodies": {"Sun": {"sign": "Leo"}}}"#).unwrap();
        let err = ChartContext::from_json(&doc).unwrap_err();
        assert!(matches!(err, ChartError::MissingField { .. }));
    }

    #[test]
    fn from_json_rejects_out_of_range_house() {
        let doc: serde_json::Value = serde_json::from_str(
            r#"{"bodies": {"Sun": {"sign": "Leo", "house": 13, "degree": 0.0,
                "speed": 1.0, "retrograde": false, "absolute_degree": 0.0}}}"#,
        )
        .unwrap();
        assert!(matches!(
            ChartContext::from_json(&doc).unwrap_err(),
            ChartError::WrongType { .. }
        ));
    }
}
