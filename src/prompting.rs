use minijinja::{context, Environment};

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/system_prompt.j2");

pub struct SystemPromptContext<'a> {
    pub company_name: &'a str,
    pub support_phone: &'a str,
    pub product_interest: Option<&'a str>,
    pub requirements: &'a [String],
}

pub fn render_system_prompt(ctx: &SystemPromptContext<'_>) -> String {
    let mut env = Environment::new();
    if env
        .add_template("system_prompt", SYSTEM_PROMPT_TEMPLATE)
        .is_err()
    {
        return fallback_system_prompt(ctx);
    }

    let Ok(template) = env.get_template("system_prompt") else {
        return fallback_system_prompt(ctx);
    };

    let product_interest = ctx
        .product_interest
        .map(str::trim)
        .filter(|p| !p.is_empty());

    template
        .render(context! {
            company_name => ctx.company_name,
            support_phone => ctx.support_phone,
            product_interest => product_interest,
            requirements => ctx.requirements,
            has_requirements => !ctx.requirements.is_empty(),
        })
        .unwrap_or_else(|_| fallback_system_prompt(ctx))
}

fn fallback_system_prompt(ctx: &SystemPromptContext<'_>) -> String {
    let mut prompt = format!(
        "You are the WhatsApp support assistant for {}.\n\
         Be accurate, warm and brief. Never invent prices, dates or order details.\n\
         For order status, ask for the 10-digit mobile number used while ordering.\n\
         If you cannot help, share the support number {}.\n",
        if ctx.company_name.trim().is_empty() {
            "our printing company"
        } else {
            ctx.company_name.trim()
        },
        ctx.support_phone
    );

    if let Some(interest) = ctx.product_interest.filter(|p| !p.trim().is_empty()) {
        prompt.push_str("\nCustomer interest: ");
        prompt.push_str(interest.trim());
        prompt.push('\n');
    }

    if !ctx.requirements.is_empty() {
        prompt.push_str("\nRequirements gathered so far:\n");
        for item in ctx.requirements {
            prompt.push_str("- ");
            prompt.push_str(item);
            prompt.push('\n');
        }
    }

    prompt
}
