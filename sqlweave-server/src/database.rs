//! Demo schema and sample data, written through the manager itself

use sqlweave::{ConnectionManager, RowData, RowValue, TableDataRequest};

pub async fn setup(manager: &ConnectionManager) -> sqlweave::Result<()> {
    manager
        .execute_statement(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                is_active BOOLEAN DEFAULT true
            );

            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                price REAL NOT NULL,
                stock INTEGER DEFAULT 0,
                category TEXT
            );

            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER REFERENCES users(id),
                product_id INTEGER REFERENCES products(id),
                quantity INTEGER NOT NULL,
                total REAL NOT NULL,
                status TEXT DEFAULT 'pending',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS orders_by_user ON orders (user_id);

            CREATE TABLE IF NOT EXISTS "order items" (
                "order" INTEGER NOT NULL REFERENCES orders(id),
                "group" TEXT,
                PRIMARY KEY ("order", "group")
            );
            "#,
        )
        .await?;

    seed_sample_data(manager).await
}

async fn seed_sample_data(manager: &ConnectionManager) -> sqlweave::Result<()> {
    let existing = manager
        .get_table_data(&TableDataRequest::new("main", "users").with_limit(1))
        .await?;
    if existing.total.unwrap_or(0) > 0 {
        tracing::debug!("demo data already present");
        return Ok(());
    }

    let first_names = [
        "Alice", "Bob", "Charlie", "Diana", "Evan", "Fiona", "George", "Hannah", "Isaac", "Julia",
    ];
    let last_names = [
        "Johnson", "Smith", "Brown", "Prince", "Davis", "Wilson", "Taylor", "Anderson",
    ];

    for index in 0..200 {
        let first = first_names[index % first_names.len()];
        let last = last_names[index % last_names.len()];
        let mut row = RowData::new();
        row.insert("name".to_string(), RowValue::from(format!("{first} {last}")));
        row.insert(
            "email".to_string(),
            RowValue::from(format!("{}.{}{}@example.com", first.to_lowercase(), last.to_lowercase(), index)),
        );
        row.insert("is_active".to_string(), RowValue::Boolean(index % 5 != 0));
        manager.insert_row("main", "users", &row).await?;
    }

    let categories = ["Electronics", "Furniture", "Stationery", "Books", "Kitchen"];
    let products: Vec<String> = (0..200)
        .map(|index| {
            format!(
                "('Product {}', {:.2}, {}, '{}')",
                index + 1,
                5.99 + index as f64 * 12.5,
                (index * 7 + 5) % 500,
                categories[index % categories.len()]
            )
        })
        .collect();
    manager
        .execute_statement(&format!(
            "INSERT INTO products (name, price, stock, category) VALUES {}",
            products.join(", ")
        ))
        .await?;

    let statuses = ["pending", "processing", "shipped", "completed", "cancelled"];
    let orders: Vec<String> = (0..2000)
        .map(|index| {
            let product_id = index % 200 + 1;
            let quantity = index % 10 + 1;
            format!(
                "({}, {}, {}, {:.2}, '{}')",
                index % 200 + 1,
                product_id,
                quantity,
                quantity as f64 * (5.99 + product_id as f64 * 12.5),
                statuses[index % statuses.len()]
            )
        })
        .collect();
    manager
        .execute_statement(&format!(
            "INSERT INTO orders (user_id, product_id, quantity, total, status) VALUES {}",
            orders.join(", ")
        ))
        .await?;

    tracing::info!(users = 200, products = 200, orders = 2000, "seeded demo data");
    Ok(())
}
