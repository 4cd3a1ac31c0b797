use std::io;
use std::sync::Arc;

use actix_web::web;
use commerce_orders::application::order_service::OrderService;
use commerce_orders::application::side_effects::SideEffectDispatcher;
use commerce_orders::application::Collaborators;
use commerce_orders::config::Config;
use commerce_orders::domain::ports::OrderRepository;
use commerce_orders::infrastructure::clients::{CommerceServicesClient, HttpPaymentGateway};
use commerce_orders::infrastructure::DieselOrderRepository;
use commerce_orders::{build_server, create_pool, run_migrations};
use dotenvy::dotenv;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(io::Error::other)?;

    let pool = create_pool(&config.database_url).map_err(io::Error::other)?;
    run_migrations(&pool).map_err(io::Error::other)?;

    let commerce = Arc::new(
        CommerceServicesClient::new(&config.commerce_services_url, config.collaborator_timeout)
            .map_err(io::Error::other)?,
    );
    let payments = Arc::new(
        HttpPaymentGateway::new(
            &config.payment_service_url,
            config.payment_provider,
            config.collaborator_timeout,
        )
        .map_err(io::Error::other)?,
    );
    let collaborators = Collaborators {
        payments,
        carts: commerce.clone(),
        addresses: commerce.clone(),
        customers: commerce.clone(),
        inventory: commerce.clone(),
        webhooks: commerce.clone(),
        wishlists: commerce.clone(),
        products: commerce,
    };

    let side_effects = SideEffectDispatcher::spawn(collaborators.clone(), config.side_effect_timeout);
    let repo: Arc<dyn OrderRepository> = Arc::new(DieselOrderRepository::new(pool));
    let service = OrderService::new(repo, collaborators, side_effects)
        .with_reference_max_attempts(config.reference_max_attempts);

    log::info!(
        "Starting server at http://{}:{} (payment provider: {})",
        config.host,
        config.port,
        config.payment_provider
    );

    build_server(web::Data::new(service), &config.host, config.port)?.await
}
