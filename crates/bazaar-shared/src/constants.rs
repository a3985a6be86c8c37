/// Application name
pub const APP_NAME: &str = "Bazaar";

/// Local store key holding the serialized cart.
pub const KEY_CART_ITEMS: &str = "cartItems";

/// Local store key holding the serialized wishlist.
pub const KEY_WISHLIST_ITEMS: &str = "wishlistItems";

/// Local store key holding the cached user profile.
pub const KEY_USER_DATA: &str = "userData";

/// Local store key holding the cached avatar reference.
pub const KEY_AVATAR_URI: &str = "avatarUri";

/// Category value that disables category filtering.
pub const CATEGORY_ALL: &str = "All";

/// Categories offered by the listing screens, in display order.
pub const CATEGORIES: [&str; 7] = [
    CATEGORY_ALL,
    "Electronics",
    "Books",
    "Fashion",
    "Sports",
    "Furniture",
    "Others",
];

/// Number of products shown in the "recommended" strip.
pub const RECOMMENDED_COUNT: usize = 4;

/// Storage bucket that receives listing images.
pub const DEFAULT_IMAGE_BUCKET: &str = "product-images";

/// Folder inside the bucket for listing images.
pub const DEFAULT_IMAGE_FOLDER: &str = "products";

/// Extension used when an image path has none (or an implausible one).
pub const DEFAULT_IMAGE_EXT: &str = "jpg";

/// Longest file extension accepted from an image path.
pub const MAX_IMAGE_EXT_LEN: usize = 5;

/// Window in which a realtime insert may reconcile a pending local send.
pub const PENDING_MATCH_WINDOW_SECS: i64 = 30;

/// Realtime heartbeat interval in seconds
pub const REALTIME_HEARTBEAT_SECS: u64 = 30;

/// Realtime protocol version sent on connect.
pub const REALTIME_VSN: &str = "1.0.0";

/// Database schema of the remote tables.
pub const REMOTE_SCHEMA: &str = "public";
