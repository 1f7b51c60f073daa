//! URDF XML parsing using `urdf-rs`.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::ModelError;
use crate::types::{Inertial, JointData, JointLimits, JointType, LinkData, Origin, RobotModel};

/// Parse a URDF file from disk into a [`RobotModel`].
pub fn parse_file(path: impl AsRef<Path>) -> Result<RobotModel, ModelError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_string(&content)
}

/// Parse a URDF XML string into a [`RobotModel`].
pub fn parse_string(xml: &str) -> Result<RobotModel, ModelError> {
    let robot = urdf_rs::read_from_string(xml).map_err(|e| ModelError::Parse(e.to_string()))?;
    convert_robot(&robot)
}

fn convert_robot(robot: &urdf_rs::Robot) -> Result<RobotModel, ModelError> {
    let links: HashMap<String, LinkData> = robot
        .links
        .iter()
        .map(|l| (l.name.clone(), convert_link(l)))
        .collect();

    let joints: HashMap<String, JointData> = robot
        .joints
        .iter()
        .map(|j| convert_joint(j).map(|jd| (jd.name.clone(), jd)))
        .collect::<Result<_, _>>()?;

    for joint in joints.values() {
        for link in [&joint.parent, &joint.child] {
            if !links.contains_key(link) {
                return Err(ModelError::MissingLink(link.clone()));
            }
        }
    }

    // Root link = a link that is never a child of any joint.
    let child_links: HashSet<&str> = joints.values().map(|j| j.child.as_str()).collect();
    let mut roots: Vec<&String> = links
        .keys()
        .filter(|name| !child_links.contains(name.as_str()))
        .collect();
    roots.sort();
    let root_link = roots.first().ok_or(ModelError::NoRootLink)?.to_string();

    Ok(RobotModel {
        name: robot.name.clone(),
        links,
        joints,
        root_link,
    })
}

fn convert_link(link: &urdf_rs::Link) -> LinkData {
    // urdf-rs fills a zero-mass inertial when the element is absent.
    let inertial = (link.inertial.mass.value > 0.0).then(|| Inertial {
        origin: convert_pose(&link.inertial.origin),
        mass: link.inertial.mass.value,
    });
    LinkData {
        name: link.name.clone(),
        inertial,
    }
}

fn convert_joint(joint: &urdf_rs::Joint) -> Result<JointData, ModelError> {
    let joint_type = match joint.joint_type {
        urdf_rs::JointType::Revolute => JointType::Revolute,
        urdf_rs::JointType::Continuous => JointType::Continuous,
        urdf_rs::JointType::Prismatic => JointType::Prismatic,
        urdf_rs::JointType::Fixed => JointType::Fixed,
        ref other => {
            return Err(ModelError::UnsupportedJointType {
                joint: joint.name.clone(),
                kind: format!("{other:?}").to_lowercase(),
            });
        }
    };

    Ok(JointData {
        name: joint.name.clone(),
        joint_type,
        parent: joint.parent.link.clone(),
        child: joint.child.link.clone(),
        origin: convert_pose(&joint.origin),
        axis: vec3(&joint.axis.xyz),
        limits: convert_limits(&joint.limit),
    })
}

fn convert_limits(limit: &urdf_rs::JointLimit) -> JointLimits {
    // urdf-rs defaults lower/upper to 0.0 for joints without limits.
    let has_limits = (limit.lower - limit.upper).abs() > f64::EPSILON;
    JointLimits {
        lower: has_limits.then_some(limit.lower),
        upper: has_limits.then_some(limit.upper),
        effort: limit.effort,
        velocity: limit.velocity,
    }
}

fn convert_pose(pose: &urdf_rs::Pose) -> Origin {
    Origin {
        xyz: vec3(&pose.xyz),
        rpy: vec3(&pose.rpy),
    }
}

const fn vec3(v: &[f64; 3]) -> [f64; 3] {
    *v
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const TWO_LINK_URDF: &str = r#"
        <robot name="two_link">
            <link name="base_link">
                <inertial>
                    <origin xyz="0 0 0.1" rpy="0 0 0"/>
                    <mass value="1.5"/>
                    <inertia ixx="0.01" ixy="0" ixz="0" iyy="0.01" iyz="0" izz="0.01"/>
                </inertial>
            </link>
            <link name="child_link"/>
            <joint name="joint1" type="revolute">
                <parent link="base_link"/>
                <child link="child_link"/>
                <origin xyz="0 0 0.5" rpy="0 0 0"/>
                <axis xyz="0 1 0"/>
                <limit lower="-1.57" upper="1.57" effort="100" velocity="5"/>
            </joint>
        </robot>
    "#;

    #[test]
    fn parses_links_and_joints() {
        let model = parse_string(TWO_LINK_URDF).unwrap();
        assert_eq!(model.name, "two_link");
        assert_eq!(model.root_link, "base_link");
        assert_eq!(model.links.len(), 2);

        let joint = model.joint("joint1").unwrap();
        assert_eq!(joint.joint_type, JointType::Revolute);
        assert_eq!(joint.parent, "base_link");
        assert_relative_eq!(joint.origin.xyz[2], 0.5);
        assert_relative_eq!(joint.axis[1], 1.0);
        assert_eq!(joint.limits.lower, Some(-1.57));
        assert_eq!(joint.limits.upper, Some(1.57));
        assert_relative_eq!(joint.limits.velocity, 5.0);
    }

    #[test]
    fn massless_links_have_no_inertial() {
        let model = parse_string(TWO_LINK_URDF).unwrap();
        let base = model.link("base_link").unwrap().inertial.as_ref().unwrap();
        assert_relative_eq!(base.mass, 1.5);
        assert_relative_eq!(base.origin.xyz[2], 0.1);
        assert!(model.link("child_link").unwrap().inertial.is_none());
    }

    #[test]
    fn continuous_joint_has_no_position_limits() {
        let xml = r#"
            <robot name="wheel">
                <link name="base"/>
                <link name="wheel"/>
                <joint name="spin" type="continuous">
                    <parent link="base"/>
                    <child link="wheel"/>
                    <axis xyz="0 0 1"/>
                </joint>
            </robot>
        "#;
        let model = parse_string(xml).unwrap();
        let joint = model.joint("spin").unwrap();
        assert!(joint.limits.lower.is_none());
        assert!(joint.limits.upper.is_none());
    }

    #[test]
    fn floating_joints_are_rejected() {
        let xml = r#"
            <robot name="float">
                <link name="world"/>
                <link name="body"/>
                <joint name="free" type="floating">
                    <parent link="world"/>
                    <child link="body"/>
                </joint>
            </robot>
        "#;
        assert!(matches!(
            parse_string(xml),
            Err(ModelError::UnsupportedJointType { .. })
        ));
    }

    #[test]
    fn invalid_xml_is_a_parse_error() {
        assert!(matches!(
            parse_string("<robot"),
            Err(ModelError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            parse_file("/nonexistent/robot.urdf"),
            Err(ModelError::Io { .. })
        ));
    }
}
