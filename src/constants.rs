// -
// Registry

/// Namespace of the primary API surface
pub(crate) const DEFAULT_NAMESPACE: &str = "vim25";

/// Property carrying an entity's parent link
pub(crate) const PARENT_PROPERTY: &str = "parent";
/// Property carrying an entity's display name
pub(crate) const NAME_PROPERTY: &str = "name";
/// Never reported by "all" property collection
pub(crate) const SELF_PROPERTY: &str = "self";

/// Value prefix of session-scoped references
pub(crate) const SESSION_REF_PREFIX: &str = "session[";

/// Privilege reported when properties are read without a session
pub(crate) const READ_PRIVILEGE: &str = "System.Read";

/// User name of the internal request context
pub(crate) const INTERNAL_USER: &str = "vcsim";

// -
// Property collector

/// vCenter's default cap on object updates per WaitForUpdatesEx response
pub(crate) const DEFAULT_MAX_OBJECT_UPDATES: usize = 100;

/// Delay between re-checks of a waiting subscriber
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 20;

// -
// History collectors

pub(crate) const DEFAULT_PAGE_SIZE: usize = 10;
pub(crate) const MAX_PAGE_SIZE: usize = 1000;
/// vCenter's default limit of live task collectors
pub(crate) const MAX_TASK_COLLECTORS: usize = 32;
pub(crate) const MAX_EVENT_COLLECTORS: usize = 1000;
/// Event master history keeps `MAX_PAGE_SIZE * EVENT_HISTORY_FACTOR` entries
pub(crate) const EVENT_HISTORY_FACTOR: usize = 5;

pub(crate) const LATEST_PAGE_PROPERTY: &str = "latestPage";
pub(crate) const FILTER_PROPERTY: &str = "filter";

// -
// Views

pub(crate) const VIEW_PROPERTY: &str = "view";
pub(crate) const VIEW_LIST_PROPERTY: &str = "viewList";
/// Types a container view may select
pub(crate) const MANAGED_ENTITY: &str = "ManagedEntity";
