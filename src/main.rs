use actix_files as fs;
use actix_web::dev::{fn_service, ServiceRequest, ServiceResponse};
use actix_web::{web::Data, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use log::{error, info, warn};

use llama_chat_relay::config::RelayConfig;
use llama_chat_relay::web::routes;
use llama_chat_relay::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting chat relay");

    let config = RelayConfig::from_env().context("loading relay configuration")?;
    let bind = (config.host.clone(), config.port);
    let static_dir = config.static_dir.clone();

    let app_state = match AppState::new(config) {
        Ok(state) => Data::new(state),
        Err(e) => {
            error!("Failed to initialize inference backend client: {}", e);
            std::process::exit(1);
        }
    };

    // Prime the model catalog; a backend that is still starting is not fatal
    match app_state.backend.list_models().await {
        Ok(models) => app_state.catalog.record(&models),
        Err(e) => warn!("Initial model listing failed, will retry on first chat: {}", e),
    }

    let serve_ui = static_dir.is_dir();
    if !serve_ui {
        warn!("Static UI directory {} not found, serving API only", static_dir.display());
    }

    info!("Listening on {}:{}", bind.0, bind.1);
    HttpServer::new(move || {
        let app = App::new()
            .app_data(app_state.clone())
            .wrap(routes::cors(&app_state.config))
            .configure(routes::configure);
        if !serve_ui {
            return app;
        }

        // Unknown paths fall back to index.html for client-side routing
        let index = static_dir.join("index.html");
        app.service(
            fs::Files::new("/", &static_dir)
                .index_file("index.html")
                .default_handler(fn_service(move |req: ServiceRequest| {
                    let index = index.clone();
                    async move {
                        let (req, _) = req.into_parts();
                        let file = fs::NamedFile::open_async(index).await?;
                        let res = file.into_response(&req);
                        Ok(ServiceResponse::new(req, res))
                    }
                })),
        )
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
