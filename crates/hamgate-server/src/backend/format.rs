//! Compact text rendering for low-bandwidth links

use serde_json::Value;

use super::entities::Entity;

const NAME_WIDTH: usize = 12;
const STATE_WIDTH: usize = 6;

/// Two-letter type tag for a domain
pub fn abbreviation(domain: &str) -> &'static str {
    match domain {
        "light" => "LT",
        "switch" => "SW",
        "sensor" => "SN",
        "cover" => "BL",
        "automation" => "AU",
        "scene" => "SC",
        "climate" => "CL",
        "fan" => "FN",
        "lock" => "LK",
        "binary_sensor" => "BS",
        "input_boolean" => "IB",
        "script" => "SR",
        _ => "??",
    }
}

/// Render an entity state in at most six characters
pub fn format_state(entity: &Entity) -> String {
    let state = entity.state.as_str();

    match state.to_lowercase().as_str() {
        "on" => return "[ON]".to_string(),
        "off" => return "[--]".to_string(),
        "unavailable" | "unknown" | "none" => return "[??]".to_string(),
        _ => {}
    }

    if let Some(value) = state.trim().parse::<f64>().ok().filter(|v| v.is_finite()) {
        let whole = value.trunc() as i64;
        return match entity.unit() {
            Some(unit @ ("°C" | "°F" | "C" | "F")) => {
                format!("{}{}", whole, unit.trim_start_matches('°'))
            }
            Some("%") => format!("{}%", whole),
            _ if entity.attribute("brightness").is_some() => format!("{}%", whole),
            _ => whole.to_string(),
        };
    }

    truncate(state, STATE_WIDTH)
}

/// Cut text to `max` characters, ending with an ellipsis when shortened
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// `{id}.{AB} {name} {state}` with the name padded for alignment
pub fn entity_line(id: u32, entity: &Entity) -> String {
    let name = truncate(&entity.friendly_name(), NAME_WIDTH);
    format!(
        "{}.{} {:<width$} {}",
        id,
        abbreviation(entity.domain()),
        name,
        format_state(entity),
        width = NAME_WIDTH
    )
}

/// Multi-line detail view
pub fn entity_detail(id: u32, entity: &Entity) -> Vec<String> {
    let mut lines = vec![
        format!(
            "#{} {} {}",
            id,
            abbreviation(entity.domain()),
            entity.friendly_name()
        ),
        format!("State: {}", format_state(entity)),
    ];

    let unit = entity.unit().unwrap_or("");
    match entity.domain() {
        "light" => {
            if let Some(brightness) = entity.attribute("brightness").and_then(Value::as_f64) {
                lines.push(format!("Bright: {}%", (brightness / 255.0 * 100.0) as i64));
            }
            if let Some(rgb) = entity.attribute("rgb_color").and_then(Value::as_array) {
                let parts: Vec<String> = rgb.iter().map(value_text).collect();
                lines.push(format!("Color: RGB({})", parts.join(",")));
            }
        }
        "cover" => {
            if let Some(position) = entity.attribute("current_position") {
                lines.push(format!("Pos: {}%", value_text(position)));
            }
        }
        "climate" => {
            if let Some(target) = entity.attribute("temperature") {
                lines.push(format!("Target: {}{}", value_text(target), unit));
            }
            if let Some(current) = entity.attribute("current_temperature") {
                lines.push(format!("Current: {}{}", value_text(current), unit));
            }
        }
        "sensor" if !unit.is_empty() => {
            lines.push(format!("Unit: {}", unit));
        }
        _ => {}
    }

    lines.push(format!("ID: {}", entity.entity_id));
    lines
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One page of a listing with header and continuation hint
///
/// `page` is clamped into range. `next_command` is the verb shown in the
/// hint, e.g. `L`.
pub fn page(
    title: &str,
    items: &[(u32, &Entity)],
    page: Option<u32>,
    page_size: usize,
    next_command: &str,
) -> Vec<String> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size).max(1);
    let current = (page.unwrap_or(1) as usize).clamp(1, total_pages);

    let mut lines = Vec::with_capacity(page_size + 2);
    lines.push(format!("{} (pg {}/{})", title, current, total_pages));

    lines.extend(
        items
            .iter()
            .skip((current - 1) * page_size)
            .take(page_size)
            .map(|(id, entity)| entity_line(*id, entity)),
    );

    if current < total_pages {
        lines.push(format!("More: {} {}", next_command, current + 1));
    }
    lines
}

/// Command summary shown by `H`
pub fn main_menu() -> Vec<String> {
    [
        "COMMANDS",
        "L [pg]    List devices",
        "S <id>    Show device",
        "ON <id>   Turn on",
        "OFF <id>  Turn off",
        "SET <id> <val> Set value",
        "A [pg]    List automations",
        "T <id>    Trigger automation",
        "R         Refresh devices",
        "H         Help (this menu)",
        "Q         Quit",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// `ERR: message` followed by an optional hint line
pub fn error_lines(message: &str, hint: Option<&str>) -> Vec<String> {
    let mut lines = vec![format!("ERR: {}", message)];
    if let Some(hint) = hint {
        lines.push(hint.to_string());
    }
    lines
}

pub fn ok_line(message: &str) -> String {
    format!("OK: {}", message)
}

/// `input_boolean` -> `Input_boolean`
pub fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn entity(id: &str, state: &str, attributes: Value) -> Entity {
        let attributes = match attributes {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Entity {
            entity_id: id.to_string(),
            state: state.to_string(),
            attributes,
        }
    }

    #[test]
    fn test_format_state() {
        assert_eq!(format_state(&entity("light.a", "on", json!({}))), "[ON]");
        assert_eq!(format_state(&entity("light.a", "OFF", json!({}))), "[--]");
        assert_eq!(format_state(&entity("light.a", "unavailable", json!({}))), "[??]");
        assert_eq!(
            format_state(&entity("sensor.t", "21.7", json!({"unit_of_measurement": "°C"}))),
            "21C"
        );
        assert_eq!(
            format_state(&entity("cover.b", "50", json!({"unit_of_measurement": "%"}))),
            "50%"
        );
        assert_eq!(format_state(&entity("sensor.n", "1013.2", json!({}))), "1013");
        assert_eq!(format_state(&entity("lock.d", "locked", json!({}))), "locked");
        assert_eq!(format_state(&entity("cover.b", "opening", json!({}))), "openi…");
    }

    #[test]
    fn test_entity_line() {
        let kitchen = entity("light.kitchen", "on", json!({"friendly_name": "Kitchen"}));
        assert_eq!(entity_line(1, &kitchen), "1.LT Kitchen      [ON]");

        let long = entity(
            "switch.x",
            "off",
            json!({"friendly_name": "Garage Door Opener"}),
        );
        assert_eq!(entity_line(12, &long), "12.SW Garage Door… [--]");
    }

    #[test]
    fn test_entity_detail() {
        let light = entity(
            "light.kitchen",
            "on",
            json!({"friendly_name": "Kitchen", "brightness": 255, "rgb_color": [255, 0, 10]}),
        );
        assert_eq!(
            entity_detail(3, &light),
            vec![
                "#3 LT Kitchen",
                "State: [ON]",
                "Bright: 100%",
                "Color: RGB(255,0,10)",
                "ID: light.kitchen",
            ]
        );
    }

    #[test]
    fn test_page_clamps_and_hints() {
        let entities: Vec<Entity> = (0..5)
            .map(|i| entity(&format!("switch.s{}", i), "on", json!({})))
            .collect();
        let items: Vec<(u32, &Entity)> = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (i as u32 + 1, e))
            .collect();

        let first = page("DEVICES", &items, None, 2, "L");
        assert_eq!(first[0], "DEVICES (pg 1/3)");
        assert_eq!(first.len(), 4);
        assert_eq!(first[3], "More: L 2");

        let last = page("DEVICES", &items, Some(99), 2, "L");
        assert_eq!(last[0], "DEVICES (pg 3/3)");
        assert_eq!(last.len(), 2);
        assert!(last[1].starts_with("5.SW"));
    }

    #[test]
    fn test_helpers() {
        assert_eq!(error_lines("Boom", Some("Hint")), vec!["ERR: Boom", "Hint"]);
        assert_eq!(ok_line("done"), "OK: done");
        assert_eq!(title_case("cover"), "Cover");
        assert_eq!(abbreviation("vacuum"), "??");
    }
}
