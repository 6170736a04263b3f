//! Group-to-department resolution.
//!
//! The group table is an ordered list of `(location, role, group_id)` rows
//! loaded once at startup. The first row whose group id appears in the
//! token's groups wins, so table order is the precedence order.
//!
//! Two JSON shapes are accepted:
//!
//! ```json
//! [{"location": "Berlin", "role": "Staff", "group_id": "aaaa-0002"}]
//! {"Berlin": {"Manager": "aaaa-0001", "Staff": "aaaa-0002"}}
//! ```
//!
//! The nested form is flattened in document order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of the group table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMapping {
    pub location: String,
    pub role: String,
    pub group_id: String,
}

/// Department/role pair resolved from a token's groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Department {
    pub location: String,
    pub role: String,
}

/// Static, ordered group table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "GroupTableSource")]
pub struct GroupTable {
    mappings: Vec<GroupMapping>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GroupTableSource {
    Rows(Vec<GroupMapping>),
    Nested(Map<String, Value>),
}

impl TryFrom<GroupTableSource> for GroupTable {
    type Error = String;

    fn try_from(source: GroupTableSource) -> Result<Self, Self::Error> {
        let locations = match source {
            GroupTableSource::Rows(mappings) => return Ok(Self::new(mappings)),
            GroupTableSource::Nested(locations) => locations,
        };

        let mut mappings = Vec::new();
        for (location, roles) in locations {
            let Value::Object(roles) = roles else {
                return Err(format!("roles of location '{location}' must be an object"));
            };
            for (role, group_id) in roles {
                let Value::String(group_id) = group_id else {
                    return Err(format!("group id of '{location}/{role}' must be a string"));
                };
                mappings.push(GroupMapping {
                    location: location.clone(),
                    role,
                    group_id,
                });
            }
        }
        Ok(Self::new(mappings))
    }
}

impl GroupTable {
    pub fn new(mappings: Vec<GroupMapping>) -> Self {
        Self { mappings }
    }

    /// Parse either accepted JSON shape.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Resolve the department for a token's groups.
    pub fn resolve(&self, groups: &[String]) -> Option<Department> {
        resolve_department(groups, &self.mappings)
    }
}

/// Return the first `(location, role)` whose group id appears,
/// case-insensitively, in `groups`.
pub fn resolve_department(groups: &[String], table: &[GroupMapping]) -> Option<Department> {
    table
        .iter()
        .find(|mapping| {
            groups
                .iter()
                .any(|group| group.eq_ignore_ascii_case(&mapping.group_id))
        })
        .map(|mapping| Department {
            location: mapping.location.clone(),
            role: mapping.role.clone(),
        })
}
