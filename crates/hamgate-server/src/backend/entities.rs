//! Entity model, filtering and numeric ids

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use hamgate_core::config::BackendConfig;

/// One Home Assistant entity state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Entity {
    /// Domain part of the entity id (`light` for `light.kitchen`)
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map(|(domain, _)| domain)
            .unwrap_or("")
    }

    /// Display name, falling back to the object id
    pub fn friendly_name(&self) -> String {
        match self.attributes.get("friendly_name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self
                .entity_id
                .rsplit('.')
                .next()
                .unwrap_or(&self.entity_id)
                .to_string(),
        }
    }

    pub fn unit(&self) -> Option<&str> {
        self.attributes
            .get("unit_of_measurement")
            .and_then(Value::as_str)
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn is_automation(&self) -> bool {
        self.domain() == "automation"
    }
}

/// Which entities are exposed over the gateway
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    include_domains: Vec<String>,
    exclude_patterns: Vec<String>,
}

impl EntityFilter {
    pub fn new(include_domains: Vec<String>, exclude_patterns: Vec<String>) -> Self {
        Self {
            include_domains,
            exclude_patterns,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(
            config.include_domains.clone(),
            config.exclude_entities.clone(),
        )
    }

    pub fn includes(&self, entity: &Entity) -> bool {
        if !self.include_domains.is_empty()
            && !self.include_domains.iter().any(|d| d == entity.domain())
        {
            return false;
        }

        !self
            .exclude_patterns
            .iter()
            .any(|pattern| glob_match(pattern, &entity.entity_id))
    }

    pub fn apply(&self, entities: Vec<Entity>) -> Vec<Entity> {
        entities.into_iter().filter(|e| self.includes(e)).collect()
    }
}

/// Shell-style match supporting `*` and `?`
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Stable numeric ids for entities, assigned in entity id order from 1
#[derive(Debug, Clone, Default)]
pub struct EntityMapper {
    entities: Vec<Entity>,
}

impl EntityMapper {
    pub fn new(mut entities: Vec<Entity>) -> Self {
        entities.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        entities.dedup_by(|a, b| a.entity_id == b.entity_id);
        entities.retain(|e| !e.entity_id.is_empty());
        Self { entities }
    }

    /// Same ids, with states taken from a newer fetch where available
    pub fn refreshed(&self, fresh: &[Entity]) -> Self {
        let by_id: HashMap<&str, &Entity> =
            fresh.iter().map(|e| (e.entity_id.as_str(), e)).collect();

        let entities = self
            .entities
            .iter()
            .map(|e| match by_id.get(e.entity_id.as_str()) {
                Some(newer) => (*newer).clone(),
                None => e.clone(),
            })
            .collect();
        Self { entities }
    }

    pub fn get(&self, id: u32) -> Option<&Entity> {
        let index = (id as usize).checked_sub(1)?;
        self.entities.get(index)
    }

    pub fn id_of(&self, entity_id: &str) -> Option<u32> {
        self.entities
            .iter()
            .position(|e| e.entity_id == entity_id)
            .and_then(|index| u32::try_from(index + 1).ok())
    }

    /// Entities with their ids
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Entity)> {
        (1u32..).zip(self.entities.iter())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(id: &str) -> Entity {
        Entity {
            entity_id: id.to_string(),
            state: "on".to_string(),
            attributes: Map::new(),
        }
    }

    #[test]
    fn test_deserialize_state() {
        let entity: Entity = serde_json::from_value(json!({
            "entity_id": "light.kitchen",
            "state": "on",
            "attributes": {"friendly_name": "Kitchen", "brightness": 200},
            "last_changed": "2024-01-01T00:00:00+00:00"
        }))
        .unwrap();

        assert_eq!(entity.domain(), "light");
        assert_eq!(entity.friendly_name(), "Kitchen");
        assert_eq!(entity.attribute("brightness"), Some(&json!(200)));
    }

    #[test]
    fn test_friendly_name_fallback() {
        assert_eq!(entity("switch.porch_fan").friendly_name(), "porch_fan");
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("sensor.*", "sensor.uptime"));
        assert!(glob_match("sensor.*_uptime", "sensor.router_uptime"));
        assert!(glob_match("light.lamp_?", "light.lamp_2"));
        assert!(!glob_match("light.lamp_?", "light.lamp_22"));
        assert!(!glob_match("sensor.*", "switch.sensor"));
        assert!(glob_match("*", ""));
    }

    #[test]
    fn test_filter() {
        let filter = EntityFilter::new(
            vec!["light".to_string(), "sensor".to_string()],
            vec!["sensor.*_uptime".to_string()],
        );

        assert!(filter.includes(&entity("light.kitchen")));
        assert!(filter.includes(&entity("sensor.temp")));
        assert!(!filter.includes(&entity("sensor.router_uptime")));
        assert!(!filter.includes(&entity("switch.porch")));

        assert!(EntityFilter::default().includes(&entity("switch.porch")));
    }

    #[test]
    fn test_mapper_ids_follow_entity_id_order() {
        let mapper = EntityMapper::new(vec![
            entity("switch.porch"),
            entity("automation.night"),
            entity("light.kitchen"),
            entity("light.kitchen"),
        ]);

        assert_eq!(mapper.len(), 3);
        assert_eq!(mapper.get(1).unwrap().entity_id, "automation.night");
        assert_eq!(mapper.get(2).unwrap().entity_id, "light.kitchen");
        assert_eq!(mapper.id_of("switch.porch"), Some(3));
        assert!(mapper.get(0).is_none());
        assert!(mapper.get(4).is_none());
    }

    #[test]
    fn test_refreshed_keeps_ids() {
        let mapper = EntityMapper::new(vec![entity("light.kitchen"), entity("switch.porch")]);

        let mut porch = entity("switch.porch");
        porch.state = "off".to_string();
        let refreshed = mapper.refreshed(&[porch, entity("light.attic")]);

        assert_eq!(refreshed.len(), 2);
        assert_eq!(refreshed.get(2).unwrap().state, "off");
        assert_eq!(refreshed.id_of("light.attic"), None);
    }
}
