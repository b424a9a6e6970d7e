use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use platup_session::Session;
use platup_transport::{ApiError, Transport};
use tracing::{debug, info, warn};

use crate::error::CatalogError;
use crate::types::{Application, Organization, normalize_list};

pub const ORGANIZATIONS_PATH: &str = "/api/organizations";
pub const APPLICATIONS_PATH: &str = "/api/applications";

/// Last-fetched organizations and applications, plus the user's selection.
///
/// `selected_app == None` means "create a new application".
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    organizations: Vec<Organization>,
    selected_org: Option<usize>,
    applications: Vec<Application>,
    applications_org: Option<String>,
    selected_app: Option<usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the organizations visible to the session's user.
    ///
    /// Selects the first one, or clears the selection when the list is empty.
    pub async fn fetch_organizations(
        &mut self,
        transport: &Transport,
        session: &Session,
    ) -> Result<&[Organization], CatalogError> {
        let token = session.bearer().ok_or(CatalogError::NotLoggedIn)?;
        let url = session.endpoint(ORGANIZATIONS_PATH);
        debug!(%url, "fetching organizations");

        let resp = transport
            .get(&url, Some(token))
            .await
            .map_err(ApiError::from)?
            .error_for_status()?;
        let mut orgs: Vec<Organization> = normalize_list(&resp)?;
        drop_unidentified(&mut orgs, |o| &o.id, "organization");

        info!(count = orgs.len(), "organizations loaded");
        self.selected_org = if orgs.is_empty() { None } else { Some(0) };
        self.organizations = orgs;
        Ok(&self.organizations)
    }

    /// Fetches the applications of `organization_id`.
    ///
    /// The application selection resets to "create new".
    pub async fn fetch_applications(
        &mut self,
        transport: &Transport,
        session: &Session,
        organization_id: &str,
    ) -> Result<&[Application], CatalogError> {
        let token = session.bearer().ok_or(CatalogError::NotLoggedIn)?;
        let url = format!(
            "{}?organizationId={}",
            session.endpoint(APPLICATIONS_PATH),
            utf8_percent_encode(organization_id, NON_ALPHANUMERIC)
        );
        debug!(%url, "fetching applications");

        let resp = transport
            .get(&url, Some(token))
            .await
            .map_err(ApiError::from)?
            .error_for_status()?;
        let mut apps: Vec<Application> = normalize_list(&resp)?;
        drop_unidentified(&mut apps, |a| &a.id, "application");

        info!(organization = organization_id, count = apps.len(), "applications loaded");
        self.applications = apps;
        self.applications_org = Some(organization_id.to_string());
        self.selected_app = None;
        Ok(&self.applications)
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    /// Organization the current application list belongs to.
    pub fn applications_organization(&self) -> Option<&str> {
        self.applications_org.as_deref()
    }

    pub fn find_organization(&self, id: &str) -> Option<&Organization> {
        self.organizations.iter().find(|o| o.id == id)
    }

    pub fn find_application(&self, id: &str) -> Option<&Application> {
        self.applications.iter().find(|a| a.id == id)
    }

    pub fn selected_organization(&self) -> Option<&Organization> {
        self.selected_org.and_then(|i| self.organizations.get(i))
    }

    pub fn selected_application(&self) -> Option<&Application> {
        self.selected_app.and_then(|i| self.applications.get(i))
    }

    /// Selects an organization from the last-fetched list.
    ///
    /// Switching organizations drops the application list of the old one.
    pub fn select_organization(&mut self, id: &str) -> Result<&Organization, CatalogError> {
        let idx = self
            .organizations
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| CatalogError::UnknownOrganization(id.to_string()))?;

        if self.applications_org.as_deref() != Some(id) {
            self.applications.clear();
            self.applications_org = None;
            self.selected_app = None;
        }
        self.selected_org = Some(idx);
        Ok(&self.organizations[idx])
    }

    /// Selects an existing application, or `None` for "create new".
    pub fn select_application(
        &mut self,
        id: Option<&str>,
    ) -> Result<Option<&Application>, CatalogError> {
        let Some(id) = id else {
            self.selected_app = None;
            return Ok(None);
        };
        let idx = self
            .applications
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| CatalogError::UnknownApplication(id.to_string()))?;
        self.selected_app = Some(idx);
        Ok(self.applications.get(idx))
    }

    /// Forgets everything. Called on logout.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Removes records the server sent without an id. They cannot be
/// selected or uploaded to.
fn drop_unidentified<T>(list: &mut Vec<T>, id: impl Fn(&T) -> &String, kind: &str) {
    let before = list.len();
    list.retain(|item| !id(item).is_empty());
    let dropped = before - list.len();
    if dropped > 0 {
        warn!(kind, dropped, "ignoring records without an id");
    }
}
