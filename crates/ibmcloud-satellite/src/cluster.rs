//! `ibm_satellite_cluster`: an OpenShift cluster running on a Satellite location

use crate::common::{at, resource_group, satellite_client, Polling};
use async_trait::async_trait;
use ibmcloud_conns::Session;
use ibmcloud_core::{
    Attribute, DataSource, Error, ErrorContext, NotFoundExt, Resource, ResourceData, Result,
    Schema, Timeouts,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

const DEPLOYING: &[&str] = &["deploying", "pending", "requested", "provisioning", "deployed"];
const RUNNING: &[&str] = &["normal", "warning"];
const REMOVING: &[&str] = &["deleting", "normal", "warning", "critical", "pending", "deploying"];

pub(crate) async fn get_cluster(
    session: &Arc<Session>,
    resource_group_id: Option<&str>,
    cluster: &str,
) -> Result<Option<Value>> {
    satellite_client(session, resource_group_id)?
        .get_query(&["v2", "getCluster"], &[("cluster", cluster)])
        .await
        .or_gone()
        .with_context(|| format!("Error getting Satellite cluster {}", cluster))
}

fn cluster_state(cluster: &Value) -> String {
    cluster
        .get("state")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn set_cluster(data: &mut ResourceData, cluster: &Value) {
    data.set("name", at(cluster, "/name"));
    data.set("location", at(cluster, "/location"));
    data.set("kube_version", at(cluster, "/masterKubeVersion"));
    data.set("state", at(cluster, "/state"));
    data.set("master_url", at(cluster, "/masterURL"));
    data.set("crn", at(cluster, "/crn"));
    data.set("resource_group_id", at(cluster, "/resourceGroup"));
    data.set("ingress_hostname", at(cluster, "/ingress/hostname"));
}

fn computed_fields(schema: Schema) -> Schema {
    schema
        .attr("state", Attribute::string().computed())
        .attr("master_url", Attribute::string().computed())
        .attr("crn", Attribute::string().computed())
        .attr("ingress_hostname", Attribute::string().computed())
}

pub struct SatelliteCluster {
    session: Arc<Session>,
    polling: Polling,
}

impl SatelliteCluster {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            polling: Polling::default(),
        }
    }

    pub fn with_polling(mut self, polling: Polling) -> Self {
        self.polling = polling;
        self
    }

    async fn wait_for(
        &self,
        resource_group_id: Option<&str>,
        cluster_id: &str,
        pending: &[&str],
        target: &[&str],
        timeout: Duration,
    ) -> Result<Option<Value>> {
        let session = &self.session;
        self.polling
            .conf(pending, target, timeout)
            .wait_for_state(move || async move {
                Ok(get_cluster(session, resource_group_id, cluster_id)
                    .await?
                    .map(|cluster| {
                        let state = cluster_state(&cluster);
                        (cluster, state)
                    }))
            })
            .await
    }
}

#[async_trait]
impl Resource for SatelliteCluster {
    fn type_name(&self) -> &'static str {
        "ibm_satellite_cluster"
    }

    fn schema(&self) -> Schema {
        computed_fields(
            Schema::new()
                .attr("name", Attribute::string().required().force_new())
                .attr("location", Attribute::string().required().force_new())
                .attr(
                    "kube_version",
                    Attribute::string()
                        .optional_computed()
                        .description("Kubernetes version, for example 4.13_openshift"),
                )
                .attr("operating_system", Attribute::string().optional().force_new())
                .attr("enable_config_admin", Attribute::bool().optional().force_new())
                .attr(
                    "resource_group_id",
                    Attribute::string().optional_computed().force_new(),
                ),
        )
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
            .with_create(Duration::from_secs(2 * 60 * 60))
            .with_update(Duration::from_secs(60 * 60))
            .with_delete(Duration::from_secs(60 * 60))
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let name = data.require_str("name")?.to_string();
        let group = resource_group(data);

        let mut body = Map::new();
        body.insert("name".into(), json!(name));
        body.insert("controller".into(), json!(data.require_str("location")?));
        if let Some(version) = data.get_str("kube_version") {
            body.insert("kubeVersion".into(), json!(version));
        }
        if let Some(os) = data.get_str("operating_system") {
            body.insert("operatingSystem".into(), json!(os));
        }
        if let Some(admin) = data.get_bool("enable_config_admin") {
            body.insert("admin".into(), json!(admin));
        }

        let created = satellite_client(&self.session, group.as_deref())?
            .post(&["v2", "satellite", "createCluster"], &Value::Object(body))
            .await
            .with_context(|| format!("Error creating Satellite cluster {}", name))?;
        let cluster_id = created
            .get("clusterID")
            .or_else(|| created.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Other("createCluster response carried no cluster ID".into()))?
            .to_string();
        data.set_id(cluster_id.clone());

        tracing::info!("Waiting for Satellite cluster {} ({}) to deploy", name, cluster_id);
        self.wait_for(
            group.as_deref(),
            &cluster_id,
            DEPLOYING,
            RUNNING,
            self.timeouts().create,
        )
        .await
        .with_context(|| format!("Error waiting for Satellite cluster {}", cluster_id))?;

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let cluster_id = data.require_id()?.to_string();
        let group = resource_group(data);

        let Some(cluster) = get_cluster(&self.session, group.as_deref(), &cluster_id).await? else {
            tracing::warn!("Satellite cluster {} not found, removing from state", cluster_id);
            data.clear_id();
            return Ok(());
        };

        set_cluster(data, &cluster);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let cluster_id = data.require_id()?.to_string();
        let group = resource_group(data);

        if data.has_change("kube_version") {
            let version = data.require_str("kube_version")?.to_string();
            satellite_client(&self.session, group.as_deref())?
                .put(
                    &["v1", "clusters", &cluster_id],
                    &json!({ "action": "update", "version": version }),
                )
                .await
                .with_context(|| {
                    format!("Error updating Satellite cluster {} to {}", cluster_id, version)
                })?;

            self.wait_for(
                group.as_deref(),
                &cluster_id,
                DEPLOYING,
                RUNNING,
                self.timeouts().update,
            )
            .await
            .with_context(|| format!("Error waiting for Satellite cluster {} update", cluster_id))?;
        }

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let cluster_id = data.require_id()?.to_string();
        let group = resource_group(data);

        let removed = satellite_client(&self.session, group.as_deref())?
            .delete_query(
                &["v1", "clusters", &cluster_id],
                &[("deleteResources", "true")],
            )
            .await
            .or_gone()
            .with_context(|| format!("Error deleting Satellite cluster {}", cluster_id))?;

        if removed.is_some() {
            self.wait_for(
                group.as_deref(),
                &cluster_id,
                REMOVING,
                &[],
                self.timeouts().delete,
            )
            .await
            .with_context(|| format!("Error waiting for Satellite cluster {} removal", cluster_id))?;
        }

        data.clear_id();
        Ok(())
    }
}

/// `ibm_satellite_cluster` data source, looked up by name or ID
pub struct SatelliteClusterSource {
    session: Arc<Session>,
}

impl SatelliteClusterSource {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DataSource for SatelliteClusterSource {
    fn type_name(&self) -> &'static str {
        "ibm_satellite_cluster"
    }

    fn schema(&self) -> Schema {
        computed_fields(
            Schema::new()
                .attr("name", Attribute::string().required())
                .attr("location", Attribute::string().computed())
                .attr("kube_version", Attribute::string().computed())
                .attr("resource_group_id", Attribute::string().optional_computed()),
        )
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let name = data.require_str("name")?.to_string();
        let group = resource_group(data);

        let cluster = get_cluster(&self.session, group.as_deref(), &name)
            .await?
            .ok_or_else(|| Error::not_found(format!("Satellite cluster {}", name)))?;

        let id = cluster
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(name.as_str())
            .to_string();
        set_cluster(data, &cluster);
        data.set_id(id);
        Ok(())
    }
}
