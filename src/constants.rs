//! # System Constants
//!
//! Names and fixed values shared by the dispatcher, the worker and the hub.

/// Queue and transport defaults
pub mod queues {
    /// Default queue carrying analysis task messages
    pub const ANALYSIS_TASKS: &str = "analysis_tasks";

    /// Connection name advertised to the broker
    pub const CONNECTION_NAME: &str = "capillary-core";

    /// Suffix for the dead-letter exchange declared next to each queue
    pub const DLX_SUFFIX: &str = "_dlx";

    /// Suffix for the dead-letter queue bound to the dead-letter exchange
    pub const DLQ_SUFFIX: &str = "_dlq";

    /// AMQP delivery mode for messages that survive a broker restart
    pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

    pub const JSON_CONTENT_TYPE: &str = "application/json";
}

/// Report generation defaults
pub mod reports {
    /// Username of the account that signs generated reports
    pub const SYSTEM_USERNAME: &str = "system";

    pub const DENSITY_LOW_THRESHOLD: f64 = 8.0;
    pub const DENSITY_HIGH_THRESHOLD: f64 = 9.5;
    pub const TORTUOSITY_HIGH_THRESHOLD: f64 = 2.0;
}

/// Photo storage naming
pub mod photos {
    /// `chrono` format used to derive photo file names
    pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

    pub const FILENAME_PREFIX: &str = "photo_";

    pub const FILENAME_EXTENSION: &str = "jpg";

    /// Extensions included in photo listings
    pub const LISTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

    /// URL prefix under which stored photos are served
    pub const URL_PREFIX: &str = "/api/photos/";

    /// Upper bound on `_N` suffixes tried for same-second saves
    pub const MAX_NAME_COLLISIONS: u32 = 1000;

    /// Extension of in-progress uploads; never listed
    pub const UPLOAD_EXTENSION: &str = "part";
}

/// Device hub limits
pub mod hub {
    /// Frames that may wait for a client before it is dropped as stalled
    pub const DEFAULT_CLIENT_BUFFER: usize = 64;
}

/// Environment variable names
pub mod env {
    pub const ENVIRONMENT: &str = "CAPILLARY_ENV";
    pub const APP_ENV: &str = "APP_ENV";
    pub const CONFIG_DIR: &str = "CAPILLARY_CONFIG_DIR";
    pub const CONFIG_PREFIX: &str = "CAPILLARY";
}
