use clap::Parser;
use fake::{
    faker::{lorem::en::{Sentence, Words}, name::en::Name},
    Fake,
};
use sqlx::sqlite::SqlitePoolOptions;
use storefront::{
    domain::{slugify, CreateCategoryRequest, CreateProductRequest, RegisterUserRequest, UserRole},
    repository::{
        CategoryRepository, ProductRepository, SqliteCategoryRepository,
        SqliteProductRepository, SqliteUserRepository, UserRepository,
    },
};

#[derive(Parser, Debug)]
#[command(name = "seed")]
#[command(about = "Fill a development database with users and a catalog", long_about = None)]
struct Args {
    /// Database to seed; created if missing
    #[arg(long, default_value = "sqlite://storefront.db?mode=rwc")]
    database_url: String,

    #[arg(long, default_value_t = 5)]
    customers: usize,

    #[arg(long, default_value_t = 8)]
    products_per_category: usize,

    #[arg(long, default_value = "admin@storefront.local")]
    admin_email: String,

    #[arg(long, default_value = "admin12345")]
    admin_password: String,
}

const CATEGORIES: [&str; 4] = ["Apparel", "Home & Kitchen", "Books", "Electronics"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let user_repo = SqliteUserRepository::new(db_pool.clone());
    let category_repo = SqliteCategoryRepository::new(db_pool.clone());
    let product_repo = SqliteProductRepository::new(db_pool.clone());

    println!("👥 Creating users...");

    user_repo.create(RegisterUserRequest {
        email: args.admin_email.clone(),
        full_name: "Store Admin".to_string(),
        password: args.admin_password.clone(),
    }, UserRole::Admin).await?;
    println!("  ✅ Created admin user ({} / {})", args.admin_email, args.admin_password);

    for i in 1..=args.customers {
        let full_name: String = Name().fake();
        let email = format!("customer{}@example.com", i);
        user_repo.create(RegisterUserRequest {
            email: email.clone(),
            full_name,
            password: "password123".to_string(),
        }, UserRole::Customer).await?;
    }
    println!("  ✅ Created {} customers (customerN@example.com / password123)", args.customers);

    println!("🛒 Creating catalog...");

    let mut product_count = 0;
    for (c, name) in CATEGORIES.iter().enumerate() {
        let category = category_repo.create(CreateCategoryRequest {
            name: name.to_string(),
            slug: None,
        }).await?;

        for p in 1..=args.products_per_category {
            let words: Vec<String> = Words(2..4).fake();
            let description: String = Sentence(6..14).fake();
            let price_cents: i64 = (299..25_000).fake();
            let stock: i64 = (0..40).fake();
            let name = capitalize(&words.join(" "));
            let sku = format!("SKU-{}{:03}", c + 1, p);

            // Fake names repeat, so the SKU keeps slugs unique
            product_repo.create(CreateProductRequest {
                category_id: category.id,
                slug: Some(format!("{}-{}", slugify(&name), sku)),
                name,
                sku: Some(sku),
                description: Some(description),
                price_cents,
                stock,
            }).await?;
            product_count += 1;
        }
    }
    println!("  ✅ Created {} categories and {} products", CATEGORIES.len(), product_count);

    println!("🎉 Seeding complete!");

    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
