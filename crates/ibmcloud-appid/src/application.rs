//! `ibm_appid_application`: an OAuth client registered with App ID

use crate::tenant_config::appid_client;
use async_trait::async_trait;
use ibmcloud_conns::Session;
use ibmcloud_core::schema::validator;
use ibmcloud_core::{
    join_id, split_id, Attribute, DataSource, Error, ErrorContext, NotFoundExt, Resource,
    ResourceData, Result, Schema,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// (attribute, wire) names of an application
const FIELDS: &[(&str, &str)] = &[
    ("client_id", "clientId"),
    ("name", "name"),
    ("type", "type"),
    ("secret", "secret"),
    ("oauth_server_url", "oAuthServerUrl"),
    ("profiles_url", "profilesUrl"),
    ("discovery_endpoint", "discoveryEndpoint"),
];

fn flatten(application: &Value) -> Map<String, Value> {
    FIELDS
        .iter()
        .map(|(attr, wire)| {
            (
                attr.to_string(),
                application.get(*wire).cloned().unwrap_or(Value::Null),
            )
        })
        .collect()
}

fn set_application(data: &mut ResourceData, application: &Value) {
    for (key, value) in flatten(application) {
        data.set(key, value);
    }
}

fn computed_fields(schema: Schema) -> Schema {
    schema
        .attr("client_id", Attribute::string().computed())
        .attr("secret", Attribute::string().computed().sensitive())
        .attr("oauth_server_url", Attribute::string().computed())
        .attr("profiles_url", Attribute::string().computed())
        .attr("discovery_endpoint", Attribute::string().computed())
}

pub struct AppIdApplication {
    session: Arc<Session>,
}

impl AppIdApplication {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Resource for AppIdApplication {
    fn type_name(&self) -> &'static str {
        "ibm_appid_application"
    }

    fn schema(&self) -> Schema {
        computed_fields(
            Schema::new()
                .attr("tenant_id", Attribute::string().required().force_new())
                .attr(
                    "name",
                    Attribute::string()
                        .required()
                        .validate(validator::string_len_between(1, 50)),
                )
                .attr(
                    "type",
                    Attribute::string()
                        .default_value("regularwebapp")
                        .force_new()
                        .validate(validator::one_of(&["regularwebapp", "singlepageapp"])),
                ),
        )
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let tenant_id = data.require_str("tenant_id")?.to_string();
        let name = data.require_str("name")?.to_string();
        let body = json!({
            "name": name,
            "type": data.get_str("type").unwrap_or("regularwebapp"),
        });

        let application = appid_client(&self.session)?
            .post(&["management", "v4", &tenant_id, "applications"], &body)
            .await
            .with_context(|| format!("Error creating AppID application {}", name))?;

        let client_id = application
            .get("clientId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Other("AppID application response carried no clientId".into()))?;
        data.set_id(join_id(&[&tenant_id, client_id]));

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [tenant_id, client_id] = split_id::<2>(&id)?;

        let Some(application) = appid_client(&self.session)?
            .get(&["management", "v4", tenant_id, "applications", client_id])
            .await
            .or_gone()
            .with_context(|| format!("Error getting AppID application {}", client_id))?
        else {
            tracing::warn!("AppID application {} not found, removing from state", id);
            data.clear_id();
            return Ok(());
        };

        data.set("tenant_id", tenant_id);
        set_application(data, &application);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [tenant_id, client_id] = split_id::<2>(&id)?;

        if data.has_change("name") {
            appid_client(&self.session)?
                .put(
                    &["management", "v4", tenant_id, "applications", client_id],
                    &json!({ "name": data.require_str("name")? }),
                )
                .await
                .with_context(|| format!("Error updating AppID application {}", client_id))?;
        }

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [tenant_id, client_id] = split_id::<2>(&id)?;

        appid_client(&self.session)?
            .delete(&["management", "v4", tenant_id, "applications", client_id])
            .await
            .or_gone()
            .with_context(|| format!("Error deleting AppID application {}", client_id))?;

        data.clear_id();
        Ok(())
    }
}

/// `ibm_appid_application`: one application by client ID
pub struct AppIdApplicationSource {
    session: Arc<Session>,
}

impl AppIdApplicationSource {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DataSource for AppIdApplicationSource {
    fn type_name(&self) -> &'static str {
        "ibm_appid_application"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("tenant_id", Attribute::string().required())
            .attr("client_id", Attribute::string().required())
            .attr("name", Attribute::string().computed())
            .attr("type", Attribute::string().computed())
            .attr("secret", Attribute::string().computed().sensitive())
            .attr("oauth_server_url", Attribute::string().computed())
            .attr("profiles_url", Attribute::string().computed())
            .attr("discovery_endpoint", Attribute::string().computed())
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let tenant_id = data.require_str("tenant_id")?.to_string();
        let client_id = data.require_str("client_id")?.to_string();

        let application = appid_client(&self.session)?
            .get(&["management", "v4", &tenant_id, "applications", &client_id])
            .await
            .with_context(|| format!("Error getting AppID application {}", client_id))?;

        set_application(data, &application);
        data.set_id(join_id(&[&tenant_id, &client_id]));
        Ok(())
    }
}

/// `ibm_appid_applications`: every application of a tenant
pub struct AppIdApplicationsSource {
    session: Arc<Session>,
}

impl AppIdApplicationsSource {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DataSource for AppIdApplicationsSource {
    fn type_name(&self) -> &'static str {
        "ibm_appid_applications"
    }

    fn schema(&self) -> Schema {
        let mut item = Schema::new();
        for (attr, _) in FIELDS {
            item = item.attr(*attr, Attribute::string().computed());
        }
        Schema::new()
            .attr("tenant_id", Attribute::string().required())
            .attr("applications", Attribute::block(item).computed())
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let tenant_id = data.require_str("tenant_id")?.to_string();

        let response = appid_client(&self.session)?
            .get(&["management", "v4", &tenant_id, "applications"])
            .await
            .with_context(|| format!("Error listing AppID applications of {}", tenant_id))?;

        let applications: Vec<Value> = response
            .get("applications")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|a| Value::Object(flatten(a)))
            .collect();

        data.set("applications", applications);
        data.set_id(tenant_id);
        Ok(())
    }
}
