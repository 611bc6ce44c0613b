//! Landing page and web UI routes.
//!
//! Serves the marketing landing page at `/`, the login screen at
//! `/login/{role}`, the OTP entry screen at `/otp/{role}`, and the dashboard
//! placeholder at `/dashboard/{role}`. The pages are static markup; the OTP
//! screen's script drives its session through `/v1/otp/sessions`.

use std::sync::Arc;

use axum::extract::Path;
use axum::response::Html;
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Build the UI router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(landing_page))
        .route("/login/{role}", get(login_page))
        .route("/otp/{role}", get(otp_page))
        .route("/dashboard/{role}", get(dashboard_page))
}

async fn landing_page() -> Html<String> {
    Html(page("Sahayak &mdash; Got a Doubt? Just Ask Sahayak.", LANDING_BODY))
}

async fn login_page(Path(role): Path<String>) -> Html<String> {
    let role = html_escape(&role);
    Html(page(
        &format!("Sign in as {role} &mdash; Sahayak"),
        &LOGIN_BODY.replace("{{ROLE}}", &role),
    ))
}

async fn otp_page(Path(role): Path<String>) -> Html<String> {
    let role = html_escape(&role);
    Html(page(
        &format!("Enter OTP &mdash; Sahayak ({role})"),
        OTP_BODY,
    ))
}

async fn dashboard_page(Path(role): Path<String>) -> Html<String> {
    let role = html_escape(&role);
    Html(page(
        &format!("Dashboard &mdash; Sahayak ({role})"),
        &DASHBOARD_BODY.replace("{{ROLE}}", &role),
    ))
}

/// Wrap a body fragment in the shared head and footer.
fn page(title: &str, body: &str) -> String {
    let mut html = String::with_capacity(PAGE_HEAD.len() + body.len() + FOOTER.len() + 64);
    html.push_str(&PAGE_HEAD.replace("{{TITLE}}", title));
    html.push_str(body);
    html.push_str(FOOTER);
    html
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Shared head and stylesheet.
const PAGE_HEAD: &str = r##"<!DOCTYPE html>
<html lang="en"><head><meta charset="utf-8"/><meta name="viewport" content="width=device-width,initial-scale=1"/>
<title>{{TITLE}}</title>
<style>
*,*::before,*::after{box-sizing:border-box;margin:0;padding:0}
:root{--bg:#FFFFFF;--text:#0A0A0A;--muted:#6B6B6B;--border:#E5E5E5;--soft:#F5F5F5;--font:-apple-system,'Segoe UI',Roboto,sans-serif}
body{font-family:var(--font);background:var(--bg);color:var(--text);line-height:1.6;min-height:100vh;display:flex;flex-direction:column}
a{color:inherit;text-decoration:none}
.nav{border-bottom:1px solid var(--border);padding:16px 24px}
.nav-inner{max-width:1100px;margin:0 auto;display:flex;align-items:center;justify-content:space-between}
.brand{display:flex;align-items:center;gap:8px;font-size:20px;font-weight:800}
.brand-mark{width:32px;height:32px;border-radius:8px;background:#000;color:#fff;display:flex;align-items:center;justify-content:center;font-size:14px}
.btn{display:inline-flex;align-items:center;justify-content:center;gap:8px;height:48px;padding:0 28px;border-radius:10px;font-size:16px;font-weight:600;border:none;cursor:pointer;transition:all .2s;font-family:var(--font)}
.btn-primary{background:#000;color:#fff}.btn-primary:hover{background:#222}
.btn-primary:disabled{background:#BDBDBD;cursor:not-allowed}
.btn-outline{background:transparent;border:1.5px solid #000;color:#000}.btn-outline:hover{background:var(--soft)}
.btn-ghost{background:transparent;height:36px;padding:0 12px}.btn-ghost:hover{background:var(--soft)}
.hero{padding:96px 24px 64px;max-width:1100px;margin:0 auto}
.eyebrow{font-size:13px;font-weight:600;letter-spacing:.12em;text-transform:uppercase;color:var(--muted)}
.hero h1{font-size:56px;font-weight:800;line-height:1.08;margin:16px 0}
.hero p{font-size:18px;color:var(--muted);max-width:560px;margin-bottom:32px}
.hero-actions{display:flex;gap:16px;flex-wrap:wrap}
.stats{display:grid;grid-template-columns:repeat(4,1fr);gap:16px;max-width:1100px;margin:0 auto;padding:0 24px 64px}
.stat{border:1px solid var(--border);border-radius:16px;padding:24px;text-align:center}
.stat b{display:block;font-size:32px}.stat span{color:var(--muted);font-size:14px}
.section{max-width:1100px;margin:0 auto;padding:64px 24px;text-align:center}
.section h2{font-size:36px;font-weight:800;margin-bottom:12px}
.section>p{color:var(--muted);font-size:18px;margin-bottom:40px}
.cards{display:grid;grid-template-columns:repeat(2,1fr);gap:24px;text-align:left}
.cards.three{grid-template-columns:repeat(3,1fr)}
.card{border:1px solid var(--border);border-radius:20px;padding:32px;transition:all .2s;display:block}
a.card:hover{border-color:#000;transform:translateY(-2px)}
.card h3{font-size:22px;font-weight:700;margin-bottom:8px}
.card p{color:var(--muted)}
main.center{flex:1;display:flex;align-items:center;justify-content:center;padding:32px 16px}
.panel{width:100%;max-width:440px;border:1px solid var(--border);border-radius:20px;padding:32px;text-align:center}
.icon-circle{width:64px;height:64px;border-radius:50%;background:#000;color:#fff;display:flex;align-items:center;justify-content:center;margin:0 auto 16px;font-size:28px}
.panel h2{font-size:24px;font-weight:800;margin-bottom:8px}
.panel .sub{color:var(--muted);font-size:14px;margin-bottom:24px}
.method-toggle{display:grid;grid-template-columns:1fr 1fr;gap:8px;margin-bottom:16px}
.method-toggle button.active{background:#000;color:#fff}
.field{width:100%;height:48px;border:1.5px solid var(--border);border-radius:10px;padding:0 14px;font-size:16px;margin-bottom:16px}
.field:focus{outline:none;border-color:#000}
.otp-row{display:flex;gap:10px;justify-content:center;margin-bottom:20px}
.otp-input{width:48px;height:56px;text-align:center;font-size:22px;font-weight:700;border:1.5px solid var(--border);border-radius:10px}
.otp-input:focus{outline:none;border-color:#000}
.otp-input:disabled{background:var(--soft)}
.resend{font-size:14px;color:var(--muted);margin-bottom:24px;min-height:22px}
.resend button{background:none;border:none;font-weight:600;cursor:pointer;font-size:14px}
.resend button:hover{text-decoration:underline}
.error{color:#B00020;font-size:14px;margin-bottom:16px;min-height:20px}
.wide{width:100%}
.success{display:none;text-align:center}
.footer{border-top:1px solid var(--border);padding:24px;text-align:center;font-size:13px;color:var(--muted)}
@media(max-width:768px){.hero h1{font-size:36px}.stats,.cards,.cards.three{grid-template-columns:1fr}}
</style></head>
<body>
"##;

/// Shared footer.
const FOOTER: &str = r##"<footer class="footer">&copy; Sahayak &mdash; your AI study partner</footer>
</body></html>
"##;

/// Marketing landing page.
const LANDING_BODY: &str = r##"<nav class="nav"><div class="nav-inner">
  <div class="brand"><span class="brand-mark">S</span>Sahayak</div>
</div></nav>
<section class="hero">
  <p class="eyebrow">Best Learning Platform</p>
  <h1>Got a Doubt? Just Ask Sahayak.</h1>
  <p>Your AI buddy that explains tough concepts, makes worksheets, and even plans lessons, just like your smartest study partner.</p>
  <div class="hero-actions">
    <a href="/login/student" class="btn btn-primary">Start Learning &rarr;</a>
    <a href="/login/teacher" class="btn btn-outline">I'm a Teacher</a>
  </div>
</section>
<section class="stats">
  <div class="stat"><b>10K+</b><span>Active Students</span></div>
  <div class="stat"><b>500+</b><span>Teachers Assisted</span></div>
  <div class="stat"><b>50+</b><span>Subject Covered</span></div>
  <div class="stat"><b>4.9</b><span>User Satisfaction</span></div>
</section>
<section class="section">
  <h2>Choose Your Learning Path</h2>
  <p>Whether you are here to learn or to teach, Sahayak adapts to you.</p>
  <div class="cards">
    <a class="card" href="/login/student"><h3>I'm a Student</h3><p>Ask doubts, practise with worksheets, and learn at your own pace.</p></a>
    <a class="card" href="/login/teacher"><h3>I'm a Teacher</h3><p>Plan lessons, generate worksheets, and support every student in your class.</p></a>
  </div>
</section>
<section class="section">
  <h2>Why Choose Sahayak?</h2>
  <p>Everything you need to learn and teach better, in one place.</p>
  <div class="cards three">
    <div class="card"><h3>Instant Doubt Solver</h3><p>Get answers to any academic question instantly with AI-powered explanations</p></div>
    <div class="card"><h3>Quality Content</h3><p>Curated courses designed for effective learning</p></div>
    <div class="card"><h3>Interactive Learning</h3><p>Engaging multimedia content and practical exercises</p></div>
  </div>
</section>
"##;

/// Login screen: pick a delivery method, enter a contact, open a session.
const LOGIN_BODY: &str = r##"<nav class="nav"><div class="nav-inner">
  <a href="/" class="btn btn-ghost">&larr;</a>
  <div class="brand"><span class="brand-mark">S</span>Sahayak</div>
  <span></span>
</div></nav>
<main class="center"><div class="panel">
  <div class="icon-circle">&#128100;</div>
  <h2>Sign in as {{ROLE}}</h2>
  <p class="sub">We'll send a 6-digit code to verify it's you.</p>
  <div class="method-toggle">
    <button type="button" class="btn btn-outline active" data-method="email">Email</button>
    <button type="button" class="btn btn-outline" data-method="phone">Phone</button>
  </div>
  <input id="contact" class="field" type="email" placeholder="you@example.com" autocomplete="email"/>
  <p class="error" id="error"></p>
  <button id="send" class="btn btn-primary wide">Send OTP</button>
</div></main>
<script>
(function(){
  var role=decodeURIComponent(location.pathname.split('/')[2]||'');
  var method='email';
  var contact=document.getElementById('contact');
  var error=document.getElementById('error');
  document.querySelectorAll('[data-method]').forEach(function(btn){
    btn.addEventListener('click',function(){
      method=btn.getAttribute('data-method');
      document.querySelectorAll('[data-method]').forEach(function(b){b.classList.toggle('active',b===btn)});
      contact.type=method==='email'?'email':'tel';
      contact.placeholder=method==='email'?'you@example.com':'+91 98765 43210';
      contact.value='';
    });
  });
  document.getElementById('send').addEventListener('click',function(){
    error.textContent='';
    fetch('/v1/otp/sessions',{method:'POST',headers:{'Content-Type':'application/json'},
      body:JSON.stringify({role:role,method:method,contact:contact.value})})
      .then(function(r){return r.json().then(function(d){if(!r.ok)throw d;return d})})
      .then(function(d){location.href='/otp/'+encodeURIComponent(role)+'?session='+d.id})
      .catch(function(e){error.textContent=(e&&e.message)||'Could not send the code'});
  });
})();
</script>
"##;

/// OTP entry screen. All state lives in the session's controller; this
/// script forwards input events and renders whatever the API returns.
const OTP_BODY: &str = r##"<nav class="nav"><div class="nav-inner">
  <button id="back" class="btn btn-ghost">&larr;</button>
  <div class="brand"><span class="brand-mark">S</span>Sahayak</div>
  <span></span>
</div></nav>
<main class="center">
<div class="panel" id="entry">
  <div class="icon-circle" id="method-icon">&#9993;</div>
  <h2>Enter OTP</h2>
  <p class="sub">We've sent a 6-digit code to<br/><b id="contact"></b></p>
  <div class="otp-row">
    <input class="otp-input" inputmode="numeric" pattern="[0-9]*" maxlength="1"/>
    <input class="otp-input" inputmode="numeric" pattern="[0-9]*" maxlength="1"/>
    <input class="otp-input" inputmode="numeric" pattern="[0-9]*" maxlength="1"/>
    <input class="otp-input" inputmode="numeric" pattern="[0-9]*" maxlength="1"/>
    <input class="otp-input" inputmode="numeric" pattern="[0-9]*" maxlength="1"/>
    <input class="otp-input" inputmode="numeric" pattern="[0-9]*" maxlength="1"/>
  </div>
  <div class="resend" id="resend"></div>
  <p class="error" id="error"></p>
  <button id="verify" class="btn btn-primary wide" disabled>Verify OTP</button>
</div>
<div class="success" id="success">
  <div class="icon-circle">&#10003;</div>
  <h2>Verification Successful!</h2>
  <p class="sub">Redirecting to your dashboard...</p>
</div>
</main>
<script>
(function(){
  var role=location.pathname.split('/')[2]||'';
  var id=new URLSearchParams(location.search).get('session');
  if(!id){location.href='/login/'+role;return}
  var api='/v1/otp/sessions/'+encodeURIComponent(id);
  var slots=Array.prototype.slice.call(document.querySelectorAll('.otp-input'));
  var leaving=false;
  function call(method,path,body){
    var init={method:method,headers:{'Content-Type':'application/json'}};
    if(body!==undefined)init.body=JSON.stringify(body);
    return fetch(api+path,init).then(function(r){return r.json().then(function(d){if(!r.ok)throw d;return d})});
  }
  function go(path){if(!leaving){leaving=true;location.href=path}}
  function render(v,follow){
    var s=v.state;
    document.getElementById('contact').textContent=v.contact;
    document.getElementById('method-icon').innerHTML=v.method==='email'?'&#9993;':'&#9742;';
    slots.forEach(function(el,i){if(el.value!==s.digits[i])el.value=s.digits[i];el.disabled=s.verifying});
    if(follow&&!s.verifying&&s.active_slot!==null&&s.active_slot!==slots.indexOf(document.activeElement)){slots[s.active_slot].focus()}
    var resend=document.getElementById('resend');
    if(s.resend_allowed){resend.innerHTML='<button type="button" id="resend-btn">Resend OTP</button>';
      document.getElementById('resend-btn').onclick=function(){call('POST','/resend').then(act).catch(fail)}}
    else{resend.textContent='Resend OTP in '+s.seconds_until_resend+'s'}
    var verify=document.getElementById('verify');
    verify.disabled=s.verifying||s.digits.some(function(d){return d===''});
    verify.textContent=s.verifying?'Verifying...':'Verify OTP';
    document.getElementById('error').textContent=s.error||'';
    if(s.verified){document.getElementById('entry').style.display='none';document.getElementById('back').style.display='none';document.getElementById('success').style.display='block'}
    if(v.redirect)go(v.redirect);
  }
  function act(v){render(v,true)}
  function fail(e){if(e&&e.error==='not_found')go('/login/'+role)}
  slots.forEach(function(el,i){
    el.addEventListener('input',function(){call('PUT','/slots/'+i,{value:el.value}).then(act).catch(fail)});
    el.addEventListener('keydown',function(e){if(e.key==='Backspace'&&el.value===''){call('POST','/slots/'+i+'/backspace').then(act).catch(fail)}});
  });
  document.getElementById('verify').addEventListener('click',function(){call('POST','/verify',{}).then(act).catch(fail)});
  document.getElementById('back').addEventListener('click',function(){
    call('DELETE','').then(function(d){go(d.redirect)}).catch(function(e){if(!(e&&e.error==='conflict'))go('/login/'+role)});
  });
  function poll(){if(!leaving)call('GET','').then(function(v){render(v,false)}).catch(fail)}
  call('GET','').then(act).catch(fail);setInterval(poll,500);
})();
</script>
"##;

/// Redirect target after a successful verification.
const DASHBOARD_BODY: &str = r##"<nav class="nav"><div class="nav-inner">
  <div class="brand"><span class="brand-mark">S</span>Sahayak</div>
  <a href="/" class="btn btn-ghost">Sign out</a>
</div></nav>
<main class="center"><div class="panel">
  <div class="icon-circle">&#127891;</div>
  <h2>Welcome, {{ROLE}}</h2>
  <p class="sub">You're signed in. Your dashboard is on its way.</p>
</div></main>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_in_role() {
        assert_eq!(
            html_escape(r#"<b onclick="x">'&"#),
            "&lt;b onclick=&quot;x&quot;&gt;&#39;&amp;"
        );
    }

    #[test]
    fn entry_script_follows_the_focused_element() {
        assert!(OTP_BODY.contains("s.active_slot!==slots.indexOf(document.activeElement)"));
        assert!(OTP_BODY.contains("function render(v,follow)"));
        assert!(!OTP_BODY.contains("focused="));
    }

    #[test]
    fn success_view_hides_back_button() {
        assert!(OTP_BODY.contains(
            "if(s.verified){document.getElementById('entry').style.display='none';document.getElementById('back').style.display='none'"
        ));
    }

    #[test]
    fn page_wraps_body_with_head_and_footer() {
        let html = page("T", "<p>body</p>");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>T</title>"));
        assert!(html.contains("<p>body</p>"));
        assert!(html.trim_end().ends_with("</html>"));
    }
}
