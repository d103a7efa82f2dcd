//! Role registry: named token templates.

use tracing::info;

use super::Backend;
use crate::records::{ROLE_PREFIX, RoleTemplate, role_key};
use crate::storage;
use crate::{Error, Result};

impl Backend {
    /// Create or replace a role.
    pub async fn put_role(&self, name: &str, template: RoleTemplate) -> Result<()> {
        validate_role_name(name)?;
        self.validate_role(&template)?;
        storage::put_json(self.storage.as_ref(), &role_key(name), &template).await?;
        info!(role = %name, username = %template.username, scope = %template.scope, "Role written");
        Ok(())
    }

    /// Fetch a role, or [`Error::RoleNotFound`].
    pub async fn get_role(&self, name: &str) -> Result<RoleTemplate> {
        validate_role_name(name)?;
        storage::get_json(self.storage.as_ref(), &role_key(name))
            .await?
            .ok_or_else(|| Error::RoleNotFound(name.to_string()))
    }

    /// Delete a role. Deleting a missing role succeeds.
    pub async fn delete_role(&self, name: &str) -> Result<()> {
        validate_role_name(name)?;
        self.storage.delete(&role_key(name)).await?;
        info!(role = %name, "Role deleted");
        Ok(())
    }

    /// Role names, sorted ascending.
    pub async fn list_roles(&self) -> Result<Vec<String>> {
        self.storage.list(ROLE_PREFIX).await
    }

    fn validate_role(&self, template: &RoleTemplate) -> Result<()> {
        if template.scope.trim().is_empty() {
            return Err(Error::InvalidRequest("scope is required".to_string()));
        }
        let backend_max = self.settings.max_ttl.as_secs();
        if template.max_ttl > 0 && backend_max > 0 && template.max_ttl > backend_max {
            return Err(Error::InvalidRequest(format!(
                "max_ttl {}s exceeds backend max_ttl {backend_max}s",
                template.max_ttl
            )));
        }
        if template.default_ttl > 0 && template.max_ttl > 0 && template.default_ttl > template.max_ttl
        {
            return Err(Error::InvalidRequest(format!(
                "default_ttl {}s exceeds max_ttl {}s",
                template.default_ttl, template.max_ttl
            )));
        }
        Ok(())
    }
}

fn validate_role_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && name != "."
        && name != "..";
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!("invalid role name '{name}'")))
    }
}
