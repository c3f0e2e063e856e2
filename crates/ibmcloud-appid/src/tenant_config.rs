//! Tenant-wide configuration documents
//!
//! Several App ID settings are a single JSON document per tenant that can
//! only be replaced as a whole (`PUT`). They have no create or delete of
//! their own: "create" writes the document, "delete" writes the documented
//! defaults back. [`TenantConfig`] implements that lifecycle once; each
//! document only describes its path and how its attributes map to the wire.

use async_trait::async_trait;
use ibmcloud_conns::{ApiClient, Service, Session};
use ibmcloud_core::{
    split_id, Attribute, DataSource, ErrorContext, MutexKv, NotFoundExt, Resource, ResourceData,
    Result, Schema,
};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// One tenant-wide configuration document
pub trait ConfigDocument: Send + Sync + 'static {
    /// Resource and data source type name
    const TYPE_NAME: &'static str;

    /// Human readable name used in error messages
    const DESCRIPTION: &'static str;

    /// Path below `/management/v4/{tenant_id}/`
    const PATH: &'static [&'static str];

    /// Attributes other than `tenant_id`, as configured on the resource
    fn attributes() -> Schema;

    /// Request body from configuration
    fn expand(data: &ResourceData) -> Result<Value>;

    /// Attributes from a response body
    fn flatten(document: &Value, data: &mut ResourceData);

    /// Document written when the resource is deleted
    fn defaults() -> Value;
}

pub(crate) fn appid_client(session: &Arc<Session>) -> Result<ApiClient> {
    session.client(Service::AppId)
}

fn document_path<'a, D: ConfigDocument>(tenant_id: &'a str) -> Vec<&'a str> {
    let mut path = vec!["management", "v4", tenant_id];
    path.extend_from_slice(D::PATH);
    path
}

async fn fetch<D: ConfigDocument>(session: &Arc<Session>, tenant_id: &str) -> Result<Option<Value>> {
    appid_client(session)?
        .get(&document_path::<D>(tenant_id))
        .await
        .or_gone()
        .with_context(|| format!("Error getting AppID {}", D::DESCRIPTION))
}

async fn store<D: ConfigDocument>(
    session: &Arc<Session>,
    tenant_id: &str,
    body: &Value,
    action: &str,
) -> Result<()> {
    let _guard = MutexKv::global().lock(tenant_id).await;
    appid_client(session)?
        .put(&document_path::<D>(tenant_id), body)
        .await
        .with_context(|| format!("Error {} AppID {}", action, D::DESCRIPTION))?;
    Ok(())
}

/// Resource adapter for a [`ConfigDocument`], identified by the tenant ID
pub struct TenantConfig<D> {
    session: Arc<Session>,
    document: PhantomData<fn() -> D>,
}

impl<D: ConfigDocument> TenantConfig<D> {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            document: PhantomData,
        }
    }
}

#[async_trait]
impl<D: ConfigDocument> Resource for TenantConfig<D> {
    fn type_name(&self) -> &'static str {
        D::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        D::attributes().attr(
            "tenant_id",
            Attribute::string()
                .required()
                .force_new()
                .description("The AppID instance GUID"),
        )
    }

    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        let tenant_id = data.require_str("tenant_id")?.to_string();
        let body = D::expand(data)?;

        store::<D>(&self.session, &tenant_id, &body, "setting").await?;
        data.set_id(tenant_id);

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [tenant_id] = split_id::<1>(&id)?;

        let Some(document) = fetch::<D>(&self.session, tenant_id).await? else {
            tracing::warn!("AppID instance {} not found, removing {} from state", tenant_id, D::TYPE_NAME);
            data.clear_id();
            return Ok(());
        };

        data.set("tenant_id", tenant_id);
        D::flatten(&document, data);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [tenant_id] = split_id::<1>(&id)?;

        if data.changed_keys().next().is_some() {
            let body = D::expand(data)?;
            store::<D>(&self.session, tenant_id, &body, "updating").await?;
        }

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id()?.to_string();
        let [tenant_id] = split_id::<1>(&id)?;

        let _guard = MutexKv::global().lock(tenant_id).await;
        appid_client(&self.session)?
            .put(&document_path::<D>(tenant_id), &D::defaults())
            .await
            .or_gone()
            .with_context(|| format!("Error resetting AppID {}", D::DESCRIPTION))?;

        data.clear_id();
        Ok(())
    }
}

/// Read-only view of a [`ConfigDocument`]
pub struct TenantConfigSource<D> {
    session: Arc<Session>,
    document: PhantomData<fn() -> D>,
}

impl<D: ConfigDocument> TenantConfigSource<D> {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            document: PhantomData,
        }
    }
}

#[async_trait]
impl<D: ConfigDocument> DataSource for TenantConfigSource<D> {
    fn type_name(&self) -> &'static str {
        D::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let mut schema = Schema::new().attr("tenant_id", Attribute::string().required());
        for (name, attr) in D::attributes().iter() {
            schema = schema.attr(name, attr.clone().into_computed());
        }
        schema
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let tenant_id = data.require_str("tenant_id")?.to_string();

        let document = fetch::<D>(&self.session, &tenant_id).await?.ok_or_else(|| {
            ibmcloud_core::Error::not_found(format!("AppID instance {}", tenant_id))
        })?;

        D::flatten(&document, data);
        data.set_id(tenant_id);
        Ok(())
    }
}
