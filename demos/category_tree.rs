//! Building and reading a Korean category tree.
//!
//! This example shows how to:
//! - Wire a service from a TOML configuration
//! - Create roots, children and a root batch
//! - Read breadcrumbs, the full tree and a single subtree
//! - Inspect the fields packed into a snowflake id
//!
//! Run with `RUST_LOG=debug cargo run --example category_tree` to see the
//! structured logs.

use catalog_tree::{
    CatalogError, CategoryService, MemoryStore, TreeNode, TreeQuery, node_of, sequence_of,
};
use catalog_tree_config::CatalogConfig;
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"
[snowflake]
epoch = "2025-09-22T00:00:00Z"
node_id = 7

[hierarchy]
policy = "depth-capped"
max_depth = 4
collation = "ko"
"#;

fn print_tree(node: &TreeNode, indent: usize) {
    println!("{}{} ({})", "  ".repeat(indent), node.name(), node.id());
    for child in node.children() {
        print_tree(child, indent + 1);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Category Tree Example ===\n");

    let config: CatalogConfig = CONFIG.parse()?;
    let service = CategoryService::from_config(&config, MemoryStore::new())?;
    println!("Generator: {}\n", service.generator());

    // 1. Roots and children
    let food = service.create("식품", None)?;
    let fruit = service.create("과일", Some(food.entity.id))?;
    let _veg = service.create("채소", Some(food.entity.id))?;
    let apple = service.create("사과", Some(fruit.entity.id))?;

    let path: Vec<&str> = apple.breadcrumb.iter().map(|e| e.name.as_str()).collect();
    println!("Created '{}' at depth {}", apple.entity.name, apple.depth);
    println!("  breadcrumb: {}", path.join(" > "));
    println!(
        "  id {} -> node {}, sequence {}, minted at {} ms",
        apple.entity.id,
        node_of(apple.entity.id),
        sequence_of(apple.entity.id),
        service.generator().extract_time_millis(apple.entity.id)
    );
    println!();

    // 2. A batch of roots
    let batch = service.create_batch(&["의류", "가구", "도서"])?;
    println!("Batch created {} roots", batch.len());

    // 3. Rejections
    match service.create(" 식품 ", None) {
        Err(err @ CatalogError::DuplicateName(_)) => {
            println!("Rejected duplicate: {} ({:?})", err, err.kind());
        }
        other => println!("Unexpected: {:?}", other),
    }
    println!();

    // 4. Reads
    println!("Full tree:");
    for root in service.get_full_tree()? {
        print_tree(&root, 1);
    }
    println!();

    println!("Subtree of '{}':", food.entity.name);
    print_tree(&service.subtree(food.entity.id)?, 1);
    println!();

    let json = serde_json::to_string_pretty(&service.get(TreeQuery::Roots)?)?;
    println!("Roots as JSON:\n{}", json);

    Ok(())
}
