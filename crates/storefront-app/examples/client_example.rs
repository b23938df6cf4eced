///  To run :
///  cargo r --example client_example
use rust_decimal::Decimal;
use storefront_client::{ListQuery, StorefrontClient};
use storefront_hex::application::TokenService;
use storefront_hex::config::AuthConfig;
use storefront_hex::inbound::http::{HttpServer, HttpServerConfig};
use storefront_repo::build_repo;
use storefront_types::domain::catalog::{NewCategory, NewProduct, NewProductSize, NewSize};
use storefront_types::domain::order::OrderStatus;
use tempfile::tempdir;

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port = find_free_port();
    let addr = format!("http://127.0.0.1:{port}/");

    // Temp file-backed SQLite DB, dropped with the directory.
    let tmp = tempdir()?;
    let db_path = tmp.path().join("storefront.db");
    let db_url = format!("sqlite://{}", db_path.display());

    let repo = build_repo(Some(&db_url)).await?;
    let server = HttpServer::new(
        repo,
        TokenService::new(&AuthConfig::default()),
        HttpServerConfig {
            port: port.to_string(),
        },
    )
    .await?;

    let handle = tokio::spawn(async move {
        server.run().await.expect("server run");
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let client = StorefrontClient::new(&addr)?;
    let category = client
        .create_category(&NewCategory {
            name: "Outerwear".into(),
            parent_id: None,
            image_url: None,
        })
        .await?;
    let size = client
        .create_size(&NewSize {
            size_code: 3,
            name: "M".into(),
        })
        .await?;
    let product = client
        .create_product(&NewProduct {
            name: "Parka".into(),
            description: Some("Warm enough".into()),
            price: Decimal::new(8900, 2),
            category_id: category.id,
            color_id: None,
            material_id: None,
            brand_id: None,
            main_image_url: None,
            sizes: vec![NewProductSize {
                size_id: size.id,
                stock_quantity: 4,
            }],
            other_image_urls: vec![],
            attributes: vec![],
        })
        .await?;
    let tracking_id = product.sizes[0].tracking_id.clone();
    println!("Created product id={} tracking id={tracking_id}", product.id);

    let listed = client.list_products(&ListQuery::default()).await?;
    println!("Listing shows {} product(s)", listed.len());

    let issued = client.issue_token().await?;
    println!("Shopping as {}", issued.anonymous_user_id);
    let shopper = client.with_token(issued.token);

    let added = shopper.add_to_cart(&tracking_id, 2).await?;
    println!("Cart {} total={}", added.order_id, added.total_price);
    assert_eq!(added.status, OrderStatus::Pending);

    let cart = shopper.active_order().await?;
    println!("Cart has {} line(s)", cart.items.len());

    let placed = shopper.checkout().await?;
    println!("{} (order {}, total {})", placed.message, placed.order_id, placed.total_price);
    assert_eq!(placed.status, OrderStatus::Packed);

    let remaining = client.get_product(product.id).await?;
    println!("Stock left: {}", remaining.total_stock_quantity);

    handle.abort();
    Ok(())
}
