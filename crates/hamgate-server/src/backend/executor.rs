//! Command execution against Home Assistant

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use hamgate_core::config::BackendConfig;
use hamgate_protocol::{Command, CommandValue};

use super::client::HomeAssistantClient;
use super::entities::{Entity, EntityFilter, EntityMapper};
use super::format::{self, error_lines, ok_line, title_case};
use super::{BackendError, CommandExecutor};

/// Domains that accept ON/OFF
const SWITCHABLE_DOMAINS: &[&str] = &[
    "light",
    "switch",
    "fan",
    "automation",
    "scene",
    "script",
    "input_boolean",
];

/// How a SET value is delivered for a domain
struct SetTarget {
    service: &'static str,
    field: &'static str,
    range: Option<(f64, f64)>,
    integer: bool,
    label: &'static str,
}

fn set_target(domain: &str) -> Option<SetTarget> {
    let target = match domain {
        "light" => SetTarget {
            service: "turn_on",
            field: "brightness",
            range: Some((0.0, 255.0)),
            integer: true,
            label: "Brightness",
        },
        "cover" => SetTarget {
            service: "set_cover_position",
            field: "position",
            range: Some((0.0, 100.0)),
            integer: true,
            label: "Position",
        },
        "climate" => SetTarget {
            service: "set_temperature",
            field: "temperature",
            range: Some((-50.0, 120.0)),
            integer: false,
            label: "Temperature",
        },
        "fan" => SetTarget {
            service: "set_percentage",
            field: "percentage",
            range: Some((0.0, 100.0)),
            integer: true,
            label: "Fan speed",
        },
        "input_number" | "number" => SetTarget {
            service: "set_value",
            field: "value",
            range: None,
            integer: false,
            label: "Value",
        },
        _ => return None,
    };
    Some(target)
}

/// Executes operator commands against the Home Assistant REST API
///
/// Numeric ids are assigned on first use and stay fixed until `R`. Listings
/// and detail views use the cached states for those ids.
pub struct HomeAssistantExecutor {
    client: HomeAssistantClient,
    filter: EntityFilter,
    page_size: usize,
    ids: RwLock<Option<Arc<EntityMapper>>>,
}

impl HomeAssistantExecutor {
    pub fn new(client: HomeAssistantClient, filter: EntityFilter, page_size: usize) -> Self {
        Self {
            client,
            filter,
            page_size: page_size.max(1),
            ids: RwLock::new(None),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self::new(
            HomeAssistantClient::new(config)?,
            EntityFilter::from_config(config),
            config.page_size,
        ))
    }

    pub fn client(&self) -> &HomeAssistantClient {
        &self.client
    }

    /// Current states under the stable ids
    async fn entities(&self) -> Result<EntityMapper, BackendError> {
        let fresh = self.filter.apply(self.client.get_states(true).await?);

        let existing = self.ids.read().await.clone();
        match existing {
            Some(ids) => Ok(ids.refreshed(&fresh)),
            None => {
                let mapper = EntityMapper::new(fresh);
                *self.ids.write().await = Some(Arc::new(mapper.clone()));
                Ok(mapper)
            }
        }
    }

    /// Re-fetch states, bypassing the cache, and reassign ids
    pub async fn refresh(&self) -> Result<usize, BackendError> {
        let fresh = self.filter.apply(self.client.get_states(false).await?);
        let mapper = EntityMapper::new(fresh);
        let count = mapper.len();
        *self.ids.write().await = Some(Arc::new(mapper));
        tracing::info!("Refreshed {} entities", count);
        Ok(count)
    }

    async fn list(&self, page: Option<u32>, automations: bool) -> Result<Vec<String>, BackendError> {
        let mapper = self.entities().await?;
        let items: Vec<(u32, &Entity)> = mapper
            .iter()
            .filter(|(_, e)| e.is_automation() == automations)
            .collect();

        if items.is_empty() {
            return Ok(if automations {
                error_lines("No automations found", None)
            } else {
                error_lines("No devices found", Some("Check HA connection"))
            });
        }

        let (title, verb) = if automations {
            ("AUTOMATIONS", "A")
        } else {
            ("DEVICES", "L")
        };
        Ok(format::page(title, &items, page, self.page_size, verb))
    }

    async fn show(&self, id: u32) -> Result<Vec<String>, BackendError> {
        let mapper = self.entities().await?;
        Ok(match mapper.get(id) {
            Some(entity) => format::entity_detail(id, entity),
            None => not_found(id),
        })
    }

    async fn switch(&self, id: u32, on: bool) -> Result<Vec<String>, BackendError> {
        let mapper = self.entities().await?;
        let Some(entity) = mapper.get(id) else {
            return Ok(not_found(id));
        };

        let word = if on { "on" } else { "off" };
        let domain = entity.domain();
        if !SWITCHABLE_DOMAINS.contains(&domain) {
            return Ok(error_lines(
                &format!("{} cannot be turned {}", title_case(domain), word),
                Some("Use SET to control this device"),
            ));
        }

        let service_domain = match domain {
            "scene" | "script" => "homeassistant",
            other => other,
        };
        let service = if on { "turn_on" } else { "turn_off" };

        let data = json!({ "entity_id": entity.entity_id });
        Ok(self
            .write(service_domain, service, data, &format!("turn {} device", word))
            .await
            .unwrap_or_else(|| vec![ok_line(&format!("{} turned {}", entity.friendly_name(), word))]))
    }

    async fn set(&self, id: u32, value: &CommandValue) -> Result<Vec<String>, BackendError> {
        let mapper = self.entities().await?;
        let Some(entity) = mapper.get(id) else {
            return Ok(not_found(id));
        };

        let domain = entity.domain();
        let Some(target) = set_target(domain) else {
            return Ok(error_lines(
                &format!("{} does not support SET", title_case(domain)),
                Some("Use ON/OFF for switches and lights"),
            ));
        };

        let Some(number) = value.as_f64() else {
            return Ok(error_lines(
                &format!("Invalid value: {}", value),
                Some("Value must be a number"),
            ));
        };

        let number = if target.integer { number.trunc() } else { number };
        if let Some((min, max)) = target.range {
            if number < min || number > max {
                return Ok(error_lines(
                    &format!("{} must be {} to {}", target.label, min, max),
                    Some(&format!("Example: SET {} {}", id, ((min + max) / 2.0).trunc())),
                ));
            }
        }

        let amount: Value = if target.integer {
            json!(number as i64)
        } else {
            json!(number)
        };
        let mut data = json!({ "entity_id": entity.entity_id });
        data[target.field] = amount;

        Ok(self
            .write(domain, target.service, data, "set device")
            .await
            .unwrap_or_else(|| {
                vec![ok_line(&format!("{} set to {}", entity.friendly_name(), value))]
            }))
    }

    async fn trigger(&self, id: u32) -> Result<Vec<String>, BackendError> {
        let mapper = self.entities().await?;
        let Some(entity) = mapper.get(id) else {
            return Ok(not_found(id));
        };

        if !entity.is_automation() {
            return Ok(error_lines(
                &format!("#{} is not an automation", id),
                Some("Use A to list automations"),
            ));
        }

        let data = json!({ "entity_id": entity.entity_id });
        Ok(self
            .write("automation", "trigger", data, "trigger automation")
            .await
            .unwrap_or_else(|| vec![ok_line(&format!("{} triggered", entity.friendly_name()))]))
    }

    /// Call a service; `None` on success, error lines on failure
    async fn write(
        &self,
        domain: &str,
        service: &str,
        data: Value,
        action: &str,
    ) -> Option<Vec<String>> {
        match self.client.call_service(domain, service, data).await {
            Ok(_) => {
                self.client.invalidate_cache().await;
                None
            }
            Err(e) => {
                tracing::warn!("Failed to {} via {}.{}: {}", action, domain, service, e);
                Some(error_lines(&format!("Failed to {}", action), Some(&e.to_string())))
            }
        }
    }
}

fn not_found(id: u32) -> Vec<String> {
    error_lines(&format!("Device #{} not found", id), Some("Use L to list devices"))
}

#[async_trait]
impl CommandExecutor for HomeAssistantExecutor {
    async fn execute(&self, command: &Command) -> Result<Vec<String>, BackendError> {
        match command {
            Command::List { page } => self.list(*page, false).await,
            Command::Automations { page } => self.list(*page, true).await,
            Command::Show { id } => self.show(*id).await,
            Command::On { id } => self.switch(*id, true).await,
            Command::Off { id } => self.switch(*id, false).await,
            Command::Set { id, value } => self.set(*id, value).await,
            Command::Trigger { id } => self.trigger(*id).await,
            Command::Help => Ok(format::main_menu()),
            Command::Quit => Ok(vec!["73!".to_string()]),
            Command::Refresh => match self.refresh().await {
                Ok(count) => Ok(vec![ok_line(&format!("Refreshed {} entities", count))]),
                Err(e) => {
                    tracing::warn!("Refresh failed: {}", e);
                    Ok(error_lines("Failed to refresh", Some(&e.to_string())))
                }
            },
        }
    }
}

impl std::fmt::Debug for HomeAssistantExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantExecutor")
            .field("base_url", &self.client.base_url())
            .field("page_size", &self.page_size)
            .finish()
    }
}
