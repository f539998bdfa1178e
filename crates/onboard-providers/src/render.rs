/// Convierte el cuerpo en texto plano de un paso en el HTML que se envía:
/// cada salto de línea pasa a `<br>`. El resto del texto se envía tal cual
/// (el contenido lo escribe el administrador de la comunidad).
pub fn body_to_html(body: &str) -> String {
    body.replace("\r\n", "\n").replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newlines_become_breaks() {
        assert_eq!(body_to_html("hola\nmundo"), "hola<br>mundo");
        assert_eq!(body_to_html("a\r\nb\n\nc"), "a<br>b<br><br>c");
        assert_eq!(body_to_html("sin saltos"), "sin saltos");
    }
}
