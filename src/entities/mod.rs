pub mod category;
pub mod design_template;
pub mod design_template_item;
pub mod inventory_log;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod product_category;
pub mod product_image;
pub mod product_review;
pub mod product_variant;
pub mod user;
pub mod wishlist_item;

pub use category::Entity as Category;
pub use design_template::Entity as DesignTemplate;
pub use design_template_item::Entity as DesignTemplateItem;
pub use inventory_log::Entity as InventoryLog;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use payment::Entity as Payment;
pub use product::Entity as Product;
pub use product_category::Entity as ProductCategory;
pub use product_image::Entity as ProductImage;
pub use product_review::Entity as ProductReview;
pub use product_variant::Entity as ProductVariant;
pub use user::Entity as User;
pub use wishlist_item::Entity as WishlistItem;
