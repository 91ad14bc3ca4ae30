//! Field localization from a single tag
//!
//! Stateless geometry: given where the robot sits in a tag's frame and where that tag
//! sits on the field, work out the robot's field pose. Display only; nothing in the
//! control loop consumes it.

use crate::common::{normalize_degrees, INCHES_PER_METER};
use nalgebra::{Rotation2, Vector2, Vector3};
use std::collections::HashMap;

/// A pose on the field, inches and degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldPose {
    pub x_in: f64,
    pub y_in: f64,
    pub heading_deg: f64,
}

impl FieldPose {
    pub fn new(x_in: f64, y_in: f64, heading_deg: f64) -> Self {
        FieldPose {
            x_in,
            y_in,
            heading_deg,
        }
    }
}

/// Robot pose expressed in a tag's frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagSpacePose {
    /// Meters; x right, y up, z forward
    pub position: Vector3<f64>,
    pub yaw_deg: f64,
}

/// Robot field pose from its pose relative to a tag with a known field pose
pub fn field_pose_from_tag(robot: &TagSpacePose, tag: &FieldPose) -> FieldPose {
    let planar = Vector2::new(robot.position.z, robot.position.x) * INCHES_PER_METER;
    let offset = Rotation2::new(tag.heading_deg.to_radians()) * planar;
    FieldPose {
        x_in: tag.x_in + offset.x,
        y_in: tag.y_in + offset.y,
        heading_deg: normalize_degrees(tag.heading_deg + robot.yaw_deg),
    }
}

/// Known field poses of localization tags
#[derive(Debug, Clone)]
pub struct TagFieldMap {
    tags: HashMap<i32, FieldPose>,
}

impl Default for TagFieldMap {
    fn default() -> Self {
        let mut tags = HashMap::new();
        tags.insert(20, FieldPose::new(0.0, 0.0, 0.0));
        tags.insert(24, FieldPose::new(144.0, 72.0, 90.0));
        TagFieldMap { tags }
    }
}

impl TagFieldMap {
    pub fn new() -> Self {
        TagFieldMap {
            tags: HashMap::new(),
        }
    }

    pub fn insert(&mut self, tag_id: i32, pose: FieldPose) {
        self.tags.insert(tag_id, pose);
    }

    /// Robot field pose, if `tag_id` is a known localization tag
    pub fn localize(&self, tag_id: i32, robot: &TagSpacePose) -> Option<FieldPose> {
        self.tags
            .get(&tag_id)
            .map(|tag| field_pose_from_tag(robot, tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_tag() {
        let robot = TagSpacePose {
            position: Vector3::new(0.5, 0.0, 1.0),
            yaw_deg: 10.0,
        };
        let pose = field_pose_from_tag(&robot, &FieldPose::new(0.0, 0.0, 0.0));
        assert_relative_eq!(pose.x_in, INCHES_PER_METER, epsilon = 1e-9);
        assert_relative_eq!(pose.y_in, 0.5 * INCHES_PER_METER, epsilon = 1e-9);
        assert_relative_eq!(pose.heading_deg, 10.0);
    }

    #[test]
    fn test_rotated_tag() {
        let robot = TagSpacePose {
            position: Vector3::new(0.0, 0.0, 1.0),
            yaw_deg: 100.0,
        };
        let map = TagFieldMap::default();
        let pose = map.localize(24, &robot).unwrap();
        assert_relative_eq!(pose.x_in, 144.0, epsilon = 1e-9);
        assert_relative_eq!(pose.y_in, 72.0 + INCHES_PER_METER, epsilon = 1e-9);
        assert_relative_eq!(pose.heading_deg, -170.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unknown_tag() {
        let robot = TagSpacePose {
            position: Vector3::zeros(),
            yaw_deg: 0.0,
        };
        assert!(TagFieldMap::default().localize(21, &robot).is_none());
        let mut map = TagFieldMap::new();
        map.insert(21, FieldPose::new(10.0, 0.0, 0.0));
        assert_relative_eq!(map.localize(21, &robot).unwrap().x_in, 10.0);
    }
}
