//! The closed set of operations exposed to the language model.
//!
//! A call arrives as a name plus a JSON argument object and is decoded into
//! one [`Capability`] variant with typed, defaulted arguments.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value, json};
use slate_core::error::{Result, SlateError};

pub const DEFAULT_SHAPE_COLOR: u32 = 0xFF0E_72ED;
pub const DEFAULT_SHAPE_WIDTH: f64 = 4.0;
pub const DEFAULT_WRITING_COLOR: u32 = 0xFF11_1827;
pub const DEFAULT_TEXT_FONT_SIZE: f64 = 34.0;
pub const DEFAULT_EQUATION_FONT_SIZE: f64 = 38.0;

fn yes() -> bool {
    true
}
fn shape_color() -> u32 {
    DEFAULT_SHAPE_COLOR
}
fn shape_width() -> f64 {
    DEFAULT_SHAPE_WIDTH
}
fn writing_color() -> u32 {
    DEFAULT_WRITING_COLOR
}
fn text_font_size() -> f64 {
    DEFAULT_TEXT_FONT_SIZE
}
fn equation_font_size() -> f64 {
    DEFAULT_EQUATION_FONT_SIZE
}
fn one() -> i64 {
    1
}
fn any() -> String {
    "any".into()
}

/// Integer arguments also arrive as floats (`4.0`); fractions are truncated.
fn whole<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    let n = Number::deserialize(d)?;
    n.as_i64()
        .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        .ok_or_else(|| D::Error::custom(format!("{n} is not a usable integer")))
}

/// ARGB colors are accepted signed or unsigned.
fn argb<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
    Ok(whole(d)? as u32)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetStudentDrawingArgs {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShapeArgs {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default = "shape_color", deserialize_with = "argb")]
    pub color_argb: u32,
    #[serde(default = "shape_width")]
    pub stroke_width: f64,
    #[serde(default = "yes")]
    pub lock_student_while_drawing: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WriteTextArgs {
    pub text: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "writing_color", deserialize_with = "argb")]
    pub color_argb: u32,
    #[serde(default = "text_font_size")]
    pub font_size: f64,
    #[serde(default = "yes")]
    pub lock_student_while_writing: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WriteEquationArgs {
    pub equation: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "equation_font_size")]
    pub font_size: f64,
    #[serde(default = "writing_color", deserialize_with = "argb")]
    pub color_argb: u32,
    #[serde(default = "yes")]
    pub lock_student_while_writing: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EraseLastArgs {
    #[serde(default = "one", deserialize_with = "whole")]
    pub count: i64,
    #[serde(default = "any")]
    pub target: String,
    #[serde(default = "yes")]
    pub lock_student_while_drawing: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClearArgs {
    #[serde(default = "yes")]
    pub lock_student_while_drawing: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ClockInArgs {
    #[serde(default)]
    pub shift_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RescheduleArgs {
    pub new_start_local_iso: String,
    pub new_end_local_iso: String,
    pub scope: String,
    pub confirmed: bool,
    #[serde(default)]
    pub shift_id: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub apply_from_local_iso: String,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum Capability {
    WhiteboardSetStudentDrawing(SetStudentDrawingArgs),
    WhiteboardDrawLine(ShapeArgs),
    WhiteboardDrawRectangle(ShapeArgs),
    WhiteboardWriteText(WriteTextArgs),
    WhiteboardWriteEquation(WriteEquationArgs),
    WhiteboardEraseLast(EraseLastArgs),
    WhiteboardClear(ClearArgs),
    TeacherClockMeIn(ClockInArgs),
    TeacherRescheduleClass(RescheduleArgs),
}

impl Capability {
    pub const NAMES: [&'static str; 9] = [
        "whiteboard_set_student_drawing",
        "whiteboard_draw_line",
        "whiteboard_draw_rectangle",
        "whiteboard_write_text",
        "whiteboard_write_equation",
        "whiteboard_erase_last",
        "whiteboard_clear",
        "teacher_clock_me_in",
        "teacher_reschedule_class",
    ];

    /// Decode a named call. A missing or null argument object means "all
    /// defaults".
    pub fn parse(name: &str, params: Value) -> Result<Self> {
        if !Self::NAMES.contains(&name) {
            return Err(SlateError::Validation(format!("unknown capability '{name}'")));
        }
        let arguments = match params {
            Value::Null => json!({}),
            other => other,
        };
        serde_json::from_value(json!({"name": name, "arguments": arguments}))
            .map_err(|e| SlateError::Validation(format!("invalid arguments for '{name}': {e}")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::WhiteboardSetStudentDrawing(_) => Self::NAMES[0],
            Self::WhiteboardDrawLine(_) => Self::NAMES[1],
            Self::WhiteboardDrawRectangle(_) => Self::NAMES[2],
            Self::WhiteboardWriteText(_) => Self::NAMES[3],
            Self::WhiteboardWriteEquation(_) => Self::NAMES[4],
            Self::WhiteboardEraseLast(_) => Self::NAMES[5],
            Self::WhiteboardClear(_) => Self::NAMES[6],
            Self::TeacherClockMeIn(_) => Self::NAMES[7],
            Self::TeacherRescheduleClass(_) => Self::NAMES[8],
        }
    }

    pub fn is_teacher_action(&self) -> bool {
        matches!(self, Self::TeacherClockMeIn(_) | Self::TeacherRescheduleClass(_))
    }
}

/// Documentation metadata for one capability.
pub struct Descriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
}

fn shape_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "x1": {"type": "number", "description": "Start x, normalized 0..1"},
            "y1": {"type": "number", "description": "Start y, normalized 0..1"},
            "x2": {"type": "number", "description": "End x, normalized 0..1"},
            "y2": {"type": "number", "description": "End y, normalized 0..1"},
            "color_argb": {"type": "integer", "default": DEFAULT_SHAPE_COLOR},
            "stroke_width": {"type": "number", "default": DEFAULT_SHAPE_WIDTH},
            "lock_student_while_drawing": {"type": "boolean", "default": true}
        },
        "required": ["x1", "y1", "x2", "y2"]
    })
}

pub fn descriptors() -> Vec<Descriptor> {
    vec![
        Descriptor {
            name: Capability::NAMES[0],
            description: "Enable or disable the student's ability to draw on the shared whiteboard.",
            schema: json!({
                "type": "object",
                "properties": {"enabled": {"type": "boolean"}},
                "required": ["enabled"]
            }),
        },
        Descriptor {
            name: Capability::NAMES[1],
            description: "Draw a straight line on the whiteboard using normalized coordinates between zero and one.",
            schema: shape_schema(),
        },
        Descriptor {
            name: Capability::NAMES[2],
            description: "Draw a rectangle on the whiteboard using normalized coordinates between zero and one.",
            schema: shape_schema(),
        },
        Descriptor {
            name: Capability::NAMES[3],
            description: "Write clean text on the whiteboard at normalized coordinates between zero and one. \
                          Use this for labels, definitions, and equations.",
            schema: json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string"},
                    "x": {"type": "number"},
                    "y": {"type": "number"},
                    "color_argb": {"type": "integer", "default": DEFAULT_WRITING_COLOR},
                    "font_size": {"type": "number", "default": DEFAULT_TEXT_FONT_SIZE},
                    "lock_student_while_writing": {"type": "boolean", "default": true}
                },
                "required": ["text", "x", "y"]
            }),
        },
        Descriptor {
            name: Capability::NAMES[4],
            description: "Write a math equation cleanly on the whiteboard. \
                          Use caret notation for powers like x^2 and underscore notation for subscripts like a_1.",
            schema: json!({
                "type": "object",
                "properties": {
                    "equation": {"type": "string"},
                    "x": {"type": "number"},
                    "y": {"type": "number"},
                    "font_size": {"type": "number", "default": DEFAULT_EQUATION_FONT_SIZE},
                    "color_argb": {"type": "integer", "default": DEFAULT_WRITING_COLOR},
                    "lock_student_while_writing": {"type": "boolean", "default": true}
                },
                "required": ["equation", "x", "y"]
            }),
        },
        Descriptor {
            name: Capability::NAMES[5],
            description: "Erase the last few whiteboard items. \
                          Use target='any' to remove whichever elements were added most recently across strokes and text.",
            schema: json!({
                "type": "object",
                "properties": {
                    "count": {"type": "integer", "default": 1, "minimum": 1, "maximum": 50},
                    "target": {"type": "string", "enum": ["any", "strokes", "texts"], "default": "any"},
                    "lock_student_while_drawing": {"type": "boolean", "default": true}
                }
            }),
        },
        Descriptor {
            name: Capability::NAMES[6],
            description: "Clear all whiteboard strokes and text.",
            schema: json!({
                "type": "object",
                "properties": {
                    "lock_student_while_drawing": {"type": "boolean", "default": true}
                }
            }),
        },
        Descriptor {
            name: Capability::NAMES[7],
            description: "Clock the teacher into class. Use this when the teacher says clock me in.",
            schema: json!({
                "type": "object",
                "properties": {"shift_id": {"type": "string", "default": ""}}
            }),
        },
        Descriptor {
            name: Capability::NAMES[8],
            description: "Reschedule a class for a teacher. \
                          Requires local datetime values, explicit scope, and explicit confirmation.",
            schema: json!({
                "type": "object",
                "properties": {
                    "new_start_local_iso": {"type": "string"},
                    "new_end_local_iso": {"type": "string"},
                    "scope": {"type": "string", "description": "today_only or all_future"},
                    "confirmed": {"type": "boolean"},
                    "shift_id": {"type": "string"},
                    "student_name": {"type": "string"},
                    "student_id": {"type": "string"},
                    "apply_from_local_iso": {"type": "string"},
                    "timezone": {"type": "string"},
                    "reason": {"type": "string"}
                },
                "required": ["new_start_local_iso", "new_end_local_iso", "scope", "confirmed"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let cap = Capability::parse(
            "whiteboard_draw_line",
            json!({"x1": 0.0, "y1": 0.0, "x2": 1.0, "y2": 1.0}),
        )
        .unwrap();
        let Capability::WhiteboardDrawLine(args) = cap else {
            panic!("wrong variant");
        };
        assert_eq!(args.color_argb, 0xFF0E_72ED);
        assert_eq!(args.stroke_width, 4.0);
        assert!(args.lock_student_while_drawing);

        let Capability::WhiteboardEraseLast(args) =
            Capability::parse("whiteboard_erase_last", Value::Null).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!((args.count, args.target.as_str()), (1, "any"));

        let Capability::WhiteboardWriteEquation(args) =
            Capability::parse("whiteboard_write_equation", json!({"equation": "x^2", "x": 0, "y": 0})).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(args.font_size, 38.0);
        assert_eq!(args.color_argb, 0xFF11_1827);
    }

    #[test]
    fn test_signed_color_accepted() {
        let cap = Capability::parse(
            "whiteboard_draw_rectangle",
            json!({"x1": 0, "y1": 0, "x2": 1, "y2": 1, "color_argb": -15830291}),
        )
        .unwrap();
        let Capability::WhiteboardDrawRectangle(args) = cap else {
            panic!("wrong variant");
        };
        assert_eq!(args.color_argb, 0xFF0E_72ED);
    }

    #[test]
    fn test_float_integers_accepted() {
        let cap = Capability::parse(
            "whiteboard_draw_line",
            json!({"x1": 0, "y1": 0, "x2": 1, "y2": 1, "color_argb": 4294967295.0}),
        )
        .unwrap();
        let Capability::WhiteboardDrawLine(args) = cap else {
            panic!("wrong variant");
        };
        assert_eq!(args.color_argb, 0xFFFF_FFFF);

        let cap = Capability::parse("whiteboard_erase_last", json!({"count": 4.0})).unwrap();
        let Capability::WhiteboardEraseLast(args) = cap else {
            panic!("wrong variant");
        };
        assert_eq!(args.count, 4);

        let cap = Capability::parse("whiteboard_erase_last", json!({"count": 2.9})).unwrap();
        let Capability::WhiteboardEraseLast(args) = cap else {
            panic!("wrong variant");
        };
        assert_eq!(args.count, 2);

        assert!(matches!(
            Capability::parse("whiteboard_erase_last", json!({"count": "3"})),
            Err(SlateError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_and_invalid() {
        assert!(matches!(
            Capability::parse("launch_rocket", json!({})),
            Err(SlateError::Validation(_))
        ));
        assert!(matches!(
            Capability::parse("whiteboard_write_text", json!({"x": 0.1})),
            Err(SlateError::Validation(_))
        ));
    }

    #[test]
    fn test_names_match_descriptors() {
        let names: Vec<_> = descriptors().iter().map(|d| d.name).collect();
        assert_eq!(names, Capability::NAMES.to_vec());
        let cap = Capability::parse("teacher_clock_me_in", json!({})).unwrap();
        assert_eq!(cap.name(), "teacher_clock_me_in");
        assert!(cap.is_teacher_action());
    }
}
