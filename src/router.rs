use regex::Regex;

type ParamsConverter<R> = Box<dyn Fn(Vec<&str>) -> Option<R> + Send + Sync>;

/// Matches request paths against regexes in registration order.
pub struct RouteParser<R> {
    routes: Vec<(Regex, ParamsConverter<R>)>,
}

impl<R> Default for RouteParser<R> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<R> RouteParser<R> {
    /// Adds a route without path parameters.
    pub fn add_route<F>(&mut self, regex_pattern: &str, f: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.add_route_with_params(regex_pattern, move |_| Some(f()));
    }

    /// Adds a route whose capture groups are handed to the converter.
    pub fn add_route_with_params<F>(&mut self, regex_pattern: &str, converter: F)
    where
        F: Fn(Vec<&str>) -> Option<R> + Send + Sync + 'static,
    {
        let regex = Regex::new(regex_pattern).unwrap_or_else(|e| panic!("Invalid route pattern {}: {}", regex_pattern, e));
        self.routes.push((regex, Box::new(converter)));
    }

    /// First route whose regex matches and whose params convert.
    pub fn test(&self, route: &str) -> Option<R> {
        self.routes.iter().find_map(|(regex, converter)| {
            regex.captures(route).and_then(|captures| {
                let params = captures
                    .iter()
                    .skip(1)
                    .filter_map(|m| m.map(|m| m.as_str()))
                    .collect::<Vec<_>>();
                converter(params)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Route {
        Root,
        Item(i32),
    }

    #[test]
    fn matches_params_and_falls_through() {
        let mut parser = RouteParser::default();
        parser.add_route(r"^/$", || Route::Root);
        parser.add_route_with_params(r"^/items/(\d+)$", |params| params.get(0).and_then(|v| v.parse().ok()).map(Route::Item));

        assert_eq!(parser.test("/"), Some(Route::Root));
        assert_eq!(parser.test("/items/42"), Some(Route::Item(42)));
        assert_eq!(parser.test("/items/abc"), None);
        assert_eq!(parser.test("/unknown"), None);
    }
}
