//! Model-issued actions.
//!
//! [`ActionDescriptor`] is the compact JSON the model emits. It is resolved
//! exactly once into a [`DeviceAction`] using a fixed precedence:
//! `POINT` > `PRESS` > `TYPE` > bare `duration` (wait).
use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};

/// Press durations above this become a long press.
pub const LONG_PRESS_THRESHOLD_MS: u64 = 200;
pub const DEFAULT_TAP_MS: u64 = 100;
pub const DEFAULT_SWIPE_MS: u64 = 300;
/// Directional swipes travel this many device pixels.
pub const SWIPE_DISTANCE_PX: i32 = 300;

/// Normalized coordinate in `[0, 1000)` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

impl Point {
    pub fn new(x: i64, y: i64) -> PilotResult<Self> {
        let valid = 0..1000;
        if !valid.contains(&x) || !valid.contains(&y) {
            return Err(PilotError::Decode(format!(
                "coordinate [{x},{y}] outside normalized range [0,1000)"
            )));
        }
        Ok(Self {
            x: x as u16,
            y: y as u16,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    fn parse(raw: &str) -> PilotResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(PilotError::Decode(format!("unknown swipe direction '{other}'"))),
        }
    }

    /// Pixel offset of a directional swipe from its start point.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -SWIPE_DISTANCE_PX),
            Self::Down => (0, SWIPE_DISTANCE_PX),
            Self::Left => (-SWIPE_DISTANCE_PX, 0),
            Self::Right => (SWIPE_DISTANCE_PX, 0),
        }
    }
}

/// Value of the `to` field: a direction name or a second point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SwipeTarget {
    Direction(String),
    Point([i64; 2]),
}

/// Wire shape of one model step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(rename = "STATUS", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "POINT", default, skip_serializing_if = "Option::is_none")]
    pub point: Option<[i64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<SwipeTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(rename = "PRESS", default, skip_serializing_if = "Option::is_none")]
    pub press: Option<String>,
    #[serde(rename = "TYPE", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_completed: Option<bool>,
}

/// A resolved, executable action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceAction {
    Tap { point: Point },
    LongPress { point: Point, duration_ms: u64 },
    SwipeDirectional { point: Point, direction: Direction, duration_ms: u64 },
    SwipeToPoint { point: Point, target: Point, duration_ms: u64 },
    KeyPress { key: String },
    TextInput { text: String },
    Wait { duration_ms: u64 },
}

impl ActionDescriptor {
    pub fn from_value(value: &serde_json::Value) -> PilotResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| PilotError::Decode(format!("output does not match action schema: {e}")))
    }

    pub fn is_completed(&self) -> bool {
        self.task_completed.unwrap_or(false)
    }

    /// `Ok(None)` means no actionable field was present.
    pub fn resolve(&self) -> PilotResult<Option<DeviceAction>> {
        if let Some([x, y]) = self.point {
            let point = Point::new(x, y)?;
            let action = match &self.to {
                Some(SwipeTarget::Direction(raw)) => DeviceAction::SwipeDirectional {
                    point,
                    direction: Direction::parse(raw)?,
                    duration_ms: self.duration.unwrap_or(DEFAULT_SWIPE_MS),
                },
                Some(SwipeTarget::Point([tx, ty])) => DeviceAction::SwipeToPoint {
                    point,
                    target: Point::new(*tx, *ty)?,
                    duration_ms: self.duration.unwrap_or(DEFAULT_SWIPE_MS),
                },
                None => {
                    let duration_ms = self.duration.unwrap_or(DEFAULT_TAP_MS);
                    if duration_ms > LONG_PRESS_THRESHOLD_MS {
                        DeviceAction::LongPress { point, duration_ms }
                    } else {
                        DeviceAction::Tap { point }
                    }
                }
            };
            return Ok(Some(action));
        }

        if let Some(key) = &self.press {
            return Ok(Some(DeviceAction::KeyPress { key: key.clone() }));
        }

        if let Some(text) = &self.text {
            return Ok(Some(DeviceAction::TextInput { text: text.clone() }));
        }

        Ok(self.duration.map(|duration_ms| DeviceAction::Wait { duration_ms }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(value: serde_json::Value) -> PilotResult<Option<DeviceAction>> {
        ActionDescriptor::from_value(&value)?.resolve()
    }

    fn pt(x: i64, y: i64) -> Point {
        Point::new(x, y).unwrap()
    }

    #[test]
    fn tap_is_default_for_bare_point() {
        let action = resolve(json!({"thought": "open settings", "POINT": [500, 300]})).unwrap();
        assert_eq!(action, Some(DeviceAction::Tap { point: pt(500, 300) }));
    }

    #[test]
    fn long_press_threshold() {
        let at = resolve(json!({"POINT": [10, 20], "duration": 200})).unwrap();
        assert_eq!(at, Some(DeviceAction::Tap { point: pt(10, 20) }));

        let over = resolve(json!({"POINT": [10, 20], "duration": 201})).unwrap();
        assert_eq!(
            over,
            Some(DeviceAction::LongPress { point: pt(10, 20), duration_ms: 201 })
        );
    }

    #[test]
    fn directional_and_point_swipes() {
        let dir = resolve(json!({"POINT": [500, 800], "to": "up"})).unwrap();
        assert_eq!(
            dir,
            Some(DeviceAction::SwipeDirectional {
                point: pt(500, 800),
                direction: Direction::Up,
                duration_ms: 300,
            })
        );

        let to = resolve(json!({"POINT": [100, 100], "to": [900, 100], "duration": 450})).unwrap();
        assert_eq!(
            to,
            Some(DeviceAction::SwipeToPoint {
                point: pt(100, 100),
                target: pt(900, 100),
                duration_ms: 450,
            })
        );
    }

    #[test]
    fn point_beats_press_beats_type() {
        let both = resolve(json!({"POINT": [1, 2], "PRESS": "BACK", "TYPE": "x"})).unwrap();
        assert!(matches!(both, Some(DeviceAction::Tap { .. })));

        let press = resolve(json!({"PRESS": "BACK", "TYPE": "x", "duration": 50})).unwrap();
        assert_eq!(press, Some(DeviceAction::KeyPress { key: "BACK".into() }));

        let text = resolve(json!({"TYPE": "hello", "duration": 50})).unwrap();
        assert_eq!(text, Some(DeviceAction::TextInput { text: "hello".into() }));
    }

    #[test]
    fn duration_alone_is_wait() {
        let wait = resolve(json!({"duration": 1500, "STATUS": "continue"})).unwrap();
        assert_eq!(wait, Some(DeviceAction::Wait { duration_ms: 1500 }));
    }

    #[test]
    fn nothing_actionable() {
        assert_eq!(resolve(json!({"thought": "done", "task_completed": true})).unwrap(), None);
        assert_eq!(resolve(json!({})).unwrap(), None);
    }

    #[test]
    fn out_of_range_points_are_rejected() {
        for bad in [json!({"POINT": [1000, 5]}), json!({"POINT": [5, -1]}), json!({"POINT": [1, 1], "to": [1, 1200]})] {
            assert!(matches!(resolve(bad), Err(PilotError::Decode(_))));
        }
    }

    #[test]
    fn malformed_shapes_are_decode_errors() {
        assert!(matches!(resolve(json!({"POINT": "center"})), Err(PilotError::Decode(_))));
        assert!(matches!(resolve(json!({"duration": -5})), Err(PilotError::Decode(_))));
        assert!(matches!(resolve(json!({"POINT": [1, 2], "to": "sideways"})), Err(PilotError::Decode(_))));
    }

    #[test]
    fn completion_flag() {
        let d = ActionDescriptor::from_value(&json!({"task_completed": true})).unwrap();
        assert!(d.is_completed());
        assert!(!ActionDescriptor::default().is_completed());
    }

    #[test]
    fn serializes_back_to_wire_names() {
        let d = ActionDescriptor {
            point: Some([5, 6]),
            press: Some("HOME".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&d).unwrap(), json!({"POINT": [5, 6], "PRESS": "HOME"}));
    }
}
