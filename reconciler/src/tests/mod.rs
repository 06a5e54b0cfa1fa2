mod remediation;
