use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wirebox_core::prelude::*;

// ==================== 应用标记 ====================

#[derive(ManagedApplication)]
#[packages("app_demo::*")]
struct DemoApp;

// ==================== 数据源（每个配置源一个实例） ====================

/// `config/Datasource.toml` 与 `config/Datasource_prod.toml` 各产生一个实例
#[derive(Managed)]
pub struct Datasource {
    #[configurable]
    url: Setting<String>,
    #[configurable]
    environment: Setting<String>,
    #[configurable(name = "pool-size")]
    pool_size: Setting<u32>,
}

impl Datasource {
    fn describe(&self) -> String {
        format!(
            "{} [{}] pool={}",
            self.url.get(),
            self.environment.get(),
            self.pool_size.get()
        )
    }
}

// ==================== 接口与实现 ====================

pub trait Greeter: Send + Sync {
    fn greet(&self, who: &str) -> String;
}

#[derive(Managed)]
#[managed(name = "greeter")]
#[implements(Greeter)]
pub struct ConsoleGreeter {
    #[configurable]
    greeting: Setting<String>,
}

impl Greeter for ConsoleGreeter {
    fn greet(&self, who: &str) -> String {
        format!("{}, {}!", self.greeting.get(), who)
    }
}

// ==================== 仓库（字段注入） ====================

#[derive(Managed)]
#[managed(name = "userRepository")]
pub struct UserRepository {
    #[wire(filter = "environment=prod")]
    datasource: Wired<Datasource>,
}

impl UserRepository {
    fn find_user(&self, id: u32) -> anyhow::Result<String> {
        let datasource = self.datasource.require()?;
        Ok(format!("user#{} via {}", id, datasource.describe()))
    }
}

// ==================== 访问作用域任务 ====================

pub trait Job: Send + Sync {
    fn run(&self) -> String;
}

static NEXT_RUN: AtomicUsize = AtomicUsize::new(1);

fn next_run_id() -> usize {
    NEXT_RUN.fetch_add(1, Ordering::SeqCst)
}

/// 每次访问都会构造一个新的 ReportJob
#[derive(Managed)]
#[implements(Job)]
pub struct ReportJob {
    #[managed(default = "next_run_id")]
    run_id: usize,
    #[wire(name = "userRepository")]
    repository: Wired<UserRepository>,
}

impl Job for ReportJob {
    fn run(&self) -> String {
        let user = self
            .repository
            .get()
            .and_then(|repository| repository.find_user(self.run_id as u32).ok())
            .unwrap_or_else(|| "no repository".to_string());
        format!("report run #{} -> {}", self.run_id, user)
    }
}

// ==================== 服务器（构造器注入与生命周期） ====================

#[derive(Managed)]
#[managed(name = "server")]
#[initialize("start")]
#[clean_up("stop")]
pub struct Server {
    #[inject(name = "userRepository")]
    repository: Arc<UserRepository>,
    #[inject]
    greeter: Option<Arc<dyn Greeter>>,
    #[wire]
    jobs: OnAccess<dyn Job>,
    #[configurable]
    host: Setting<String>,
    #[configurable]
    port: Setting<u16>,
}

impl Server {
    fn start(&self) {
        println!("🚀 Server listening on {}:{}", self.host.get(), self.port.get());
    }

    fn stop(&self) -> anyhow::Result<()> {
        println!("👋 Server on port {} shutting down", self.port.get());
        Ok(())
    }

    fn handle_request(&self, path: &str) -> anyhow::Result<String> {
        let greeting = self
            .greeter
            .as_ref()
            .map(|greeter| greeter.greet(path))
            .unwrap_or_default();
        Ok(format!("{} | {}", greeting, self.repository.find_user(7)?))
    }
}

// ==================== 主程序 ====================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config");
    let settings = ContextSettings {
        config_dir,
        env_prefix: Some("APP_".to_string()),
        ..ContextSettings::default()
    };

    let context = Application::new("WireboxDemo")
        .settings(settings)
        .run::<DemoApp>()?;

    println!("\n📦 Registered components:");
    for name in context.component_names() {
        println!("   - {}", name);
    }

    {
        let server = context
            .get_instance::<Server>("server")
            .ok_or_else(|| anyhow!("server component is missing"))?;
        println!("\n🔧 {}", server.handle_request("/api/users")?);

        // 并发访问：每个任务得到自己的 ReportJob 实例
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let server = Arc::clone(&server);
                tokio::spawn(async move { server.jobs.invoke(|job| job.run()) })
            })
            .collect();
        println!("\n🗂️  Access-scoped jobs:");
        for handle in handles {
            println!("   {}", handle.await??);
        }
    }

    println!("\n💡 Try: APP_SERVER_PORT=9000 cargo run -p app-demo\n");

    context.close()?;
    println!("✅ Application shutdown complete!");
    Ok(())
}
