use minijinja::{context, path_loader, Environment};

use crate::error::AppResult;
use crate::model::PlanName;

/// Template environment loading pages lazily from `dir`
pub fn environment(dir: &str) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_loader(path_loader(dir));
    env
}

pub fn render_home(env: &Environment<'_>) -> AppResult<String> {
    let template = env.get_template("index.html")?;
    Ok(template.render(context! {
        product => "Safety Nexus",
        plans => PlanName::catalog(),
    })?)
}

pub fn render_pricing(env: &Environment<'_>) -> AppResult<String> {
    let template = env.get_template("pricing.html")?;
    Ok(template.render(context! {
        product => "Safety Nexus",
        plans => PlanName::catalog(),
    })?)
}
