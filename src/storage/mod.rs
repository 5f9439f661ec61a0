pub mod lockout;
pub mod protection;
pub mod templates;
pub mod user_store;

pub use lockout::LockoutFile;
pub use protection::{EncryptedTemplate, MasterKey, TemplateProtector};
pub use templates::{ProtectedTemplates, TemplateRecord};
pub use user_store::{FileTemplateStore, TemplateStore};
