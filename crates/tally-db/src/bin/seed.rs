//! # Seed Data Generator
//!
//! Populates the database with demo staff, products and sales for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed users, products and 40 sales (default)
//! cargo run -p tally-db --bin seed
//!
//! # Generate a custom number of sales
//! cargo run -p tally-db --bin seed -- --sales 200
//!
//! # Specify database path, print what was created as JSON
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db --json
//! ```
//!
//! ## Generated Data
//! - 4 users: admin, manager and two salespeople (skipped if the email exists)
//! - 3 products: two commissioned on sale, one on profit
//! - Sales spread over the last months, 1 to 12 installments each, so a
//!   reconcile pass has overdue rows to promote

use chrono::{Datelike, Months, NaiveDate, Utc};
use serde::Serialize;
use std::env;
use tally_core::{
    CommissionRate, CommissionRule, Money, NewProduct, NewSale, NewUser, Product, Role, User,
};
use tally_db::{Database, DbConfig};

/// (name, email, role)
const USERS: &[(&str, &str, Role)] = &[
    ("Administrador", "admin@improve.com", Role::Admin),
    ("Gerente Comercial", "gerente@improve.com", Role::Manager),
    ("João Silva", "joao@improve.com", Role::Salesperson),
    ("Maria Souza", "maria@improve.com", Role::Salesperson),
];

const CLIENTS: &[&str] = &[
    "Ana Pereira",
    "Bruno Costa",
    "Camila Rocha",
    "Diego Alves",
    "Fernanda Lima",
    "Gustavo Ribeiro",
    "Helena Martins",
    "Igor Fernandes",
];

const CAMPAIGNS: &[Option<&str>] = &[None, Some("Volta às aulas"), Some("Black Friday"), None];

const PAYMENT_METHODS: &[&str] = &["boleto", "cartão", "pix"];

/// Installment counts to cycle through.
const COUNTS: &[i64] = &[1, 3, 6, 10, 12];

#[derive(Debug, Default, Serialize)]
struct SeedSummary {
    users: Vec<String>,
    products: Vec<String>,
    sales: usize,
    installments: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut sales_count: usize = 40;
    let mut db_path = String::from("./tally_dev.db");
    let mut json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sales" | "-s" => {
                if i + 1 < args.len() {
                    sales_count = args[i + 1].parse().unwrap_or(40);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--json" => json = true,
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --sales <N>    Number of sales to generate (default: 40)");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("      --json         Print a JSON summary of the seeded data");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Sales:    {}", sales_count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let mut summary = SeedSummary::default();

    // Users
    let mut salespeople: Vec<User> = Vec::new();
    for (name, email, role) in USERS {
        let user = match db.users().get_by_email(email).await? {
            Some(existing) => existing,
            None => {
                db.users()
                    .insert(&NewUser {
                        name: name.to_string(),
                        email: email.to_string(),
                        role: *role,
                        avatar_url: Some(format!("https://i.pravatar.cc/150?u={}", email)),
                    })
                    .await?
            }
        };
        summary.users.push(user.email.clone());
        if user.role == Role::Salesperson {
            salespeople.push(user);
        }
    }
    println!("✓ {} users ready", summary.users.len());

    // Products
    let existing = db.products().list(true).await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} products", existing.len());
        println!("  Skipping products and sales to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let products = seed_products(&db).await?;
    summary.products = products.iter().map(|p| p.name.clone()).collect();
    println!("✓ {} products created", products.len());

    // Sales
    println!();
    println!("Generating sales...");
    let start = std::time::Instant::now();
    let today = Utc::now().date_naive();

    for n in 0..sales_count {
        let new_sale = generate_sale(n, today, &products, &salespeople);

        match db.sales().create_sale(&new_sale).await {
            Ok(created) => {
                summary.sales += 1;
                summary.installments += created.installments.len();
            }
            Err(e) => eprintln!("Failed to create sale {}: {}", n, e),
        }
    }

    println!(
        "✓ Generated {} sales ({} installments) in {:?}",
        summary.sales,
        summary.installments,
        start.elapsed()
    );

    // Bring statuses up to date so the demo shows overdue rows
    db.installments().reconcile_overdue(today).await?;
    println!("✓ Reconciled as of {}", today);

    if json {
        println!();
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

async fn seed_products(db: &Database) -> Result<Vec<Product>, Box<dyn std::error::Error>> {
    let definitions = [
        NewProduct {
            name: "Curso de Inglês - Semestral".to_string(),
            description: Some("Curso completo de inglês (6 meses)".to_string()),
            rule: CommissionRule::on_sale(CommissionRate::from_bps(1000)),
        },
        NewProduct {
            name: "Material Didático".to_string(),
            description: Some("Kit de livros e acesso online".to_string()),
            rule: CommissionRule::on_profit(CommissionRate::from_bps(1500), Money::from_cents(15_000)),
        },
        NewProduct {
            name: "Preparatório TOEFL".to_string(),
            description: Some("Curso intensivo para certificação".to_string()),
            rule: CommissionRule::on_sale(CommissionRate::from_bps(1200)),
        },
    ];

    let mut products = Vec::with_capacity(definitions.len());
    for definition in &definitions {
        products.push(db.products().insert(definition).await?);
    }
    Ok(products)
}

/// Builds a deterministic demo sale from its index.
fn generate_sale(n: usize, today: NaiveDate, products: &[Product], salespeople: &[User]) -> NewSale {
    let product = &products[n % products.len()];
    let seller = &salespeople[n % salespeople.len()];
    let count = COUNTS[n % COUNTS.len()];

    // 300.00 - 2499.00, whole reais
    let amount = Money::from_major_minor(300 + ((n * 173) % 2200) as i64, 0);

    // sales closed over the last ~8 months, first installment on day 5 or 20
    let months_back = (n % 8) as u32;
    let sale_date = today
        .checked_sub_months(Months::new(months_back))
        .unwrap_or(today);
    let start_day = if n % 2 == 0 { 5 } else { 20 };
    let installment_start_date = sale_date.with_day(start_day).unwrap_or(sale_date);

    NewSale {
        product_id: product.id.clone(),
        salesperson_id: seller.id.clone(),
        amount,
        installment_count: count,
        installment_start_date,
        sale_date,
        client_name: CLIENTS[n % CLIENTS.len()].to_string(),
        student_name: None,
        campaign: CAMPAIGNS[n % CAMPAIGNS.len()].map(str::to_string),
        payment_method: Some(PAYMENT_METHODS[n % PAYMENT_METHODS.len()].to_string()),
    }
}
