use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use angular_runtime::{
    Application, Directive, DirectiveDefinition, DirectiveRegistry, RuntimeError,
};

type Log = Rc<RefCell<Vec<String>>>;

struct Named {
    name: &'static str,
}

impl Directive for Named {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn named(name: &'static str) -> DirectiveDefinition {
    DirectiveDefinition::directive(name).factory(move |_| Ok(Box::new(Named { name })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_attribute_wins_and_renders_last() {
        let mut registry = DirectiveRegistry::new();

        let helper = registry
            .register(
                named("Helper")
                    .host_attribute("id", "helper")
                    .host_attribute("role", "button"),
            )
            .unwrap();
        registry
            .register(
                named("Root")
                    .selector("[root]")
                    .host_attribute("id", "root")
                    .compose(helper),
            )
            .unwrap();

        let mut app = Application::new(registry);
        let el = app.create_root("div", &[("root", "")]).unwrap();
        let bindings = app.bindings(el).unwrap();

        assert_eq!(bindings.attribute("id"), Some("root"));
        assert_eq!(bindings.attribute("role"), Some("button"));
        // The winning value is also the last one in render order.
        let keys: Vec<&String> = bindings.attributes.keys().collect();
        assert_eq!(keys.last().map(|k| k.as_str()), Some("id"));
    }

    #[test]
    fn classes_and_styles_are_unioned_with_root_style_override() {
        let mut registry = DirectiveRegistry::new();

        let helper = registry
            .register(
                named("Helper")
                    .host_class("menu")
                    .host_style("color", "red")
                    .host_style("width", "10px"),
            )
            .unwrap();
        registry
            .register(
                named("Root")
                    .selector("[root]")
                    .host_class("expanded")
                    .host_style("color", "blue")
                    .compose(helper),
            )
            .unwrap();

        let mut app = Application::new(registry);
        let el = app.create_root("div", &[("root", "")]).unwrap();
        let bindings = app.bindings(el).unwrap();

        assert!(bindings.has_class("menu"));
        assert!(bindings.has_class("expanded"));
        assert_eq!(bindings.style("color"), Some("blue"));
        assert_eq!(bindings.style("width"), Some("10px"));
    }

    #[test]
    fn markup_attributes_are_never_overwritten() {
        let mut registry = DirectiveRegistry::new();

        registry
            .register(
                named("Root")
                    .selector("[root]")
                    .host_attribute("id", "from-directive")
                    .host_class("decorated"),
            )
            .unwrap();

        let mut app = Application::new(registry);
        let el = app
            .create_root("div", &[("root", ""), ("id", "static"), ("class", "plain")])
            .unwrap();
        let bindings = app.bindings(el).unwrap();

        assert_eq!(bindings.attribute("id"), Some("static"));
        assert!(bindings.has_class("plain"));
        assert!(bindings.has_class("decorated"));
    }

    #[test]
    fn all_contributed_listeners_fire_in_order_with_root_last() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = DirectiveRegistry::new();

        let record = |log: &Log| {
            let log = log.clone();
            move |instance: &mut dyn Directive| {
                let name = instance
                    .as_any()
                    .downcast_ref::<Named>()
                    .map(|n| n.name)
                    .unwrap_or("?");
                log.borrow_mut().push(format!("{name}.click"));
            }
        };

        let helper = registry
            .register(named("Helper").host_listener("click", record(&log)))
            .unwrap();
        registry
            .register(
                named("Root")
                    .selector("[root]")
                    .compose(helper)
                    .host_listener("click", record(&log)),
            )
            .unwrap();

        let mut app = Application::new(registry);
        let el = app.create_root("button", &[("root", "")]).unwrap();

        assert_eq!(app.bindings(el).unwrap().listener_count("click"), 2);
        let fired = app.dispatch(el, "click").unwrap();
        assert_eq!(fired, 2);
        assert_eq!(*log.borrow(), vec!["Helper.click", "Root.click"]);

        assert_eq!(app.dispatch(el, "keydown").unwrap(), 0);
    }

    #[test]
    fn component_bindings_apply_last_even_with_later_directives() {
        let mut registry = DirectiveRegistry::new();

        let mut widget = named("Widget")
            .selector("my-widget")
            .host_attribute("data-kind", "component");
        widget.is_component = true;
        registry.register(widget).unwrap();
        registry
            .register(
                named("Decorator")
                    .selector("[decorate]")
                    .host_attribute("data-kind", "directive"),
            )
            .unwrap();

        let mut app = Application::new(registry);
        let el = app.create_root("my-widget", &[("decorate", "")]).unwrap();

        assert_eq!(
            app.bindings(el).unwrap().attribute("data-kind"),
            Some("component")
        );
    }

    #[test]
    fn snapshot_serializes_for_debug_tooling() {
        let mut registry = DirectiveRegistry::new();

        let helper = registry
            .register(named("Helper").host_class("menu").host_listener("click", |_| {}))
            .unwrap();
        registry
            .register(
                named("Root")
                    .selector("[root]")
                    .host_attribute("role", "menu")
                    .compose(helper),
            )
            .unwrap();

        let mut app = Application::new(registry);
        let el = app.create_root("div", &[("root", "")]).unwrap();
        let snapshot = app.binding_snapshot(el).unwrap();

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["classes"][0], "menu");
        assert_eq!(json["events"][0], "click");
        // The markup attribute seeds the table; directive bindings follow.
        assert_eq!(json["attributes"][0][0], "root");
        assert_eq!(json["attributes"][1][0], "role");
    }

    #[test]
    fn bindings_of_destroyed_element_are_inaccessible() {
        let mut registry = DirectiveRegistry::new();
        registry.register(named("Root").selector("[root]")).unwrap();

        let mut app = Application::new(registry);
        let el = app.create_root("div", &[("root", "")]).unwrap();
        app.destroy(el).unwrap();

        assert_eq!(app.bindings(el).unwrap_err(), RuntimeError::DestroyedElement);
    }
}
