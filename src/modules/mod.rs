pub mod books;
pub mod text;

use bookshelf_kernel::ModuleRegistry;

use books::store::BookReviews;

/// Register all application modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, reviews: BookReviews) -> anyhow::Result<()> {
    registry.register(text::create_module())?;
    registry.register(books::create_module(reviews))?;
    Ok(())
}
